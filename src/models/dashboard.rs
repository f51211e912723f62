// src/models/dashboard.rs

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::contract::ContractStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: ContractStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CycleCounts {
    pub ok: i64,
    pub due: i64,
    pub overdue: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub by_status: Vec<StatusCount>,
    pub cycle: CycleCounts,
    /// Soma dos saldos dos contratos não cancelados.
    #[schema(example = "15230.00")]
    pub outstanding_balance: Decimal,
    #[schema(example = "1200.00")]
    pub fines_accrued: Decimal,
}
