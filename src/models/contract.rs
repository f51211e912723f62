// src/models/contract.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Enums ---

// Mapeia o CREATE TYPE contract_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "contract_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Active,
    DueSoon,
    Overdue,
    Expired,
    Renewed,
    Cancelled,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 7] = [
        ContractStatus::Draft,
        ContractStatus::Active,
        ContractStatus::DueSoon,
        ContractStatus::Overdue,
        ContractStatus::Expired,
        ContractStatus::Renewed,
        ContractStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Active => "active",
            ContractStatus::DueSoon => "due_soon",
            ContractStatus::Overdue => "overdue",
            ContractStatus::Expired => "expired",
            ContractStatus::Renewed => "renewed",
            ContractStatus::Cancelled => "cancelled",
        }
    }

    /// Estados que carimbam `terminated_at`.
    pub fn stamps_termination(&self) -> bool {
        matches!(
            self,
            ContractStatus::Expired | ContractStatus::Renewed | ContractStatus::Cancelled
        )
    }

    /// Contratos em vigor: recebem visitas e entram na varredura diária.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ContractStatus::Active | ContractStatus::DueSoon | ContractStatus::Overdue
        )
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rótulo derivado (não autoritativo) usado para filtros rápidos na UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Ok,
    Due,
    Overdue,
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[schema(example = 42)]
    pub id: i64,
    pub location_id: i64,

    #[schema(value_type = String, format = Date, example = "2024-01-15")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2025-01-15")]
    pub end_date: NaiveDate,

    pub status: ContractStatus,

    #[schema(value_type = Option<String>, format = Date, example = "2024-04-14")]
    pub next_due_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = Date, example = "2024-01-15")]
    pub last_effective_visit_date: Option<NaiveDate>,
    pub technician_id: Option<i64>,

    // Valores
    #[schema(example = "300.00")]
    pub govt_fee: Decimal,
    #[schema(example = "1200.00")]
    pub amc_value: Decimal,
    #[schema(example = "0.00")]
    pub fine_amount: Decimal,
    #[schema(example = "1500.00")]
    pub total_amount: Decimal,
    #[schema(example = "500.00")]
    pub paid_amount: Decimal,
    #[schema(example = "1000.00")]
    pub balance: Decimal,

    // Linhagem de renovação
    pub renewal_of: Option<i64>,
    pub terminated_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Dados de inserção; o status inicial vem de quem cria (draft manual, active no import/renovação).
#[derive(Debug, Clone, PartialEq)]
pub struct NewContract {
    pub location_id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: ContractStatus,
    pub next_due_date: Option<NaiveDate>,
    pub last_effective_visit_date: Option<NaiveDate>,
    pub technician_id: Option<i64>,
    pub govt_fee: Decimal,
    pub amc_value: Decimal,
    pub fine_amount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub balance: Decimal,
    pub renewal_of: Option<i64>,
}

/// Contrato criado manualmente pelo gestor; nasce em `draft`.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftContract {
    pub location_id: i64,
    pub start_date: NaiveDate,
    pub technician_id: Option<i64>,
    pub govt_fee: Decimal,
    pub amc_value: Decimal,
}

/// Uma transição já validada contra a tabela, aplicada de forma condicional ao status lido.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub contract_id: i64,
    pub from: ContractStatus,
    pub to: ContractStatus,
    pub actor: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    /// Payload gravado no evento de auditoria.
    pub fn metadata(&self) -> Value {
        serde_json::json!({
            "previousStatus": self.from.as_str(),
            "actor": self.actor,
        })
    }

    pub fn terminated_at(&self) -> Option<DateTime<Utc>> {
        self.to.stamps_termination().then_some(self.at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractEvent {
    pub id: i64,
    pub contract_id: i64,
    #[schema(example = "due_soon")]
    pub event_type: String,
    #[schema(value_type = Object)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Contrato + rótulo de ciclo, para listagens.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractView {
    #[serde(flatten)]
    pub contract: Contract,
    pub cycle_status: Option<CycleStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenewalResponse {
    pub new_contract_id: i64,
}

/// Resultado da varredura diária.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub expired: u32,
    pub due_soon: u32,
    pub overdue: u32,
    pub failed: u32,
}

impl SweepReport {
    pub fn transitions(&self) -> u32 {
        self.expired + self.due_soon + self.overdue
    }
}
