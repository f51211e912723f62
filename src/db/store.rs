// src/db/store.rs
//
// Contratos de persistência usados pelos serviços. A implementação de produção é
// Postgres (`*_repo.rs`); os testes usam `MemoryStore`.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        contract::{Contract, ContractEvent, ContractStatus, NewContract, StatusChange},
        customer::{Customer, Location, MergeOutcome, NewCustomer, NewLocation, TechnicianArea},
        import::{ImportCounters, ImportRun, ImportRunItem, NewImportRunItem},
        visit::{NewPayment, NewVisit, Payment, Visit, VisitEffect, VisitPayment},
    },
    services::fines::Totals,
};

#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn list_customers(&self) -> Result<Vec<Customer>, AppError>;

    async fn find_customer(&self, id: i64) -> Result<Option<Customer>, AppError>;

    async fn create_customer(&self, new: &NewCustomer) -> Result<Customer, AppError>;

    /// Remove o cliente apenas se não restar nenhum local. Retorna se removeu.
    async fn delete_customer_if_orphan(&self, id: i64) -> Result<bool, AppError>;

    /// Move os locais dos duplicados para o principal e apaga os duplicados, atomicamente.
    async fn merge_customers(&self, primary_id: i64, duplicate_ids: &[i64]) -> Result<MergeOutcome, AppError>;

    async fn list_locations(&self, customer_id: i64) -> Result<Vec<Location>, AppError>;

    async fn find_location(&self, id: i64) -> Result<Option<Location>, AppError>;

    async fn create_location(&self, new: &NewLocation) -> Result<Location, AppError>;

    /// Remove o local apenas se nenhum contrato o referencia. Retorna se removeu.
    async fn delete_location_if_unused(&self, id: i64) -> Result<bool, AppError>;

    async fn list_technician_areas(&self) -> Result<Vec<TechnicianArea>, AppError>;
}

#[async_trait]
pub trait ContractStore: Send + Sync {
    async fn find_contract(&self, id: i64) -> Result<Option<Contract>, AppError>;

    /// Lista por status; slice vazio = todos.
    async fn list_contracts(&self, statuses: &[ContractStatus]) -> Result<Vec<Contract>, AppError>;

    async fn find_contract_by_location_and_start(
        &self,
        location_id: i64,
        start_date: NaiveDate,
    ) -> Result<Option<Contract>, AppError>;

    async fn create_contract(&self, new: &NewContract) -> Result<Contract, AppError>;

    /// Aplica a transição e grava o evento na mesma transação.
    /// Falha com `StaleState` se o status atual não for mais `change.from`.
    async fn apply_transition(&self, change: &StatusChange) -> Result<(), AppError>;

    /// Insere o sucessor e marca o antecessor como renovado, tudo ou nada.
    async fn renew_contract(&self, replacement: &NewContract, change: &StatusChange) -> Result<i64, AppError>;

    async fn delete_contract(&self, id: i64) -> Result<bool, AppError>;

    async fn list_events(&self, contract_id: i64) -> Result<Vec<ContractEvent>, AppError>;

    /// Grava a visita, o efeito no contrato (e a reativação) e o pagamento recebido, tudo ou nada.
    /// Falha com `StaleState` se o status não for mais `expected_status` ou o valor pago tiver mudado.
    async fn record_visit(
        &self,
        visit: &NewVisit,
        expected_status: ContractStatus,
        effect: Option<&VisitEffect>,
        payment: Option<&VisitPayment>,
    ) -> Result<Visit, AppError>;

    /// Grava o pagamento e os novos totais, desde que `paid_amount` ainda seja `expected_paid`.
    async fn record_payment(
        &self,
        payment: &NewPayment,
        expected_paid: Decimal,
        totals: &Totals,
    ) -> Result<Payment, AppError>;
}

#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn create_run(&self, initiated_by: Option<Uuid>) -> Result<ImportRun, AppError>;

    async fn add_run_item(&self, item: &NewImportRunItem) -> Result<(), AppError>;

    async fn finish_run(&self, run_id: i64, counters: &ImportCounters) -> Result<(), AppError>;

    async fn find_run(&self, id: i64) -> Result<Option<ImportRun>, AppError>;

    async fn list_runs(&self) -> Result<Vec<ImportRun>, AppError>;

    async fn list_run_items(&self, run_id: i64) -> Result<Vec<ImportRunItem>, AppError>;

    async fn delete_run(&self, id: i64) -> Result<bool, AppError>;
}
