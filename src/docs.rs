// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Contracts ---
        handlers::contracts::set_status,
        handlers::contracts::renew_contract,
        handlers::contracts::create_contract,
        handlers::contracts::list_contracts,
        handlers::contracts::get_contract,
        handlers::contracts::list_events,
        handlers::contracts::delete_contract,
        handlers::contracts::run_sweep,

        // --- Visits ---
        handlers::visits::record_visit,
        handlers::visits::record_payment,

        // --- Import ---
        handlers::imports::import_rows,
        handlers::imports::import_csv,
        handlers::imports::download_template,
        handlers::imports::preview_conflicts,
        handlers::imports::list_runs,
        handlers::imports::undo_import,

        // --- Customers ---
        handlers::customers::list_customers,
        handlers::customers::list_locations,
        handlers::customers::list_duplicates,
        handlers::customers::merge_customers,

        // --- Dashboard ---
        handlers::dashboard::get_summary,
    ),
    components(
        schemas(
            // --- Contracts ---
            models::contract::ContractStatus,
            models::contract::CycleStatus,
            models::contract::Contract,
            models::contract::ContractEvent,
            models::contract::ContractView,
            models::contract::RenewalResponse,
            models::contract::SweepReport,
            services::fines::RateTier,

            // --- Customers ---
            models::customer::Customer,
            models::customer::Location,
            models::customer::DuplicateGroup,
            models::customer::MergeOutcome,

            // --- Visits ---
            models::visit::VisitType,
            models::visit::Visit,
            models::visit::Payment,

            // --- Import ---
            models::import::ImportCounters,
            models::import::RowResult,
            models::import::ImportReport,
            models::import::RowConflicts,
            models::import::ImportRun,
            models::import::UndoSummary,

            // --- Dashboard ---
            models::dashboard::StatusCount,
            models::dashboard::CycleCounts,
            models::dashboard::DashboardSummary,

            // --- Payloads ---
            handlers::contracts::StatusPayload,
            handlers::contracts::RenewPayload,
            handlers::contracts::CreateContractPayload,
            handlers::visits::VisitPayload,
            handlers::visits::PaymentPayload,
            handlers::imports::ImportPayload,
            handlers::imports::ConflictsPayload,
            handlers::imports::UndoPayload,
            handlers::imports::UndoResponse,
            handlers::customers::MergePayload,
        )
    ),
    tags(
        (name = "Contracts", description = "Ciclo de vida dos contratos AMC"),
        (name = "Visits", description = "Check-ins de campo e pagamentos"),
        (name = "Import", description = "Importação e conciliação de planilhas"),
        (name = "Customers", description = "Clientes, locais e deduplicação"),
        (name = "Dashboard", description = "Indicadores gerenciais")
    ),
    modifiers(&ActorAddon)
)]
pub struct ApiDoc;

// Documenta o cabeçalho opcional de auditoria
struct ActorAddon;

impl utoipa::Modify for ActorAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "actor",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-user-id"))),
        );
    }
}
