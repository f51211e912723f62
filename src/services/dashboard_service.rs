// src/services/dashboard_service.rs

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{
    common::error::AppError,
    db::ContractStore,
    models::{
        contract::{Contract, ContractStatus, CycleStatus},
        dashboard::{CycleCounts, DashboardSummary, StatusCount},
    },
    services::lifecycle_service::cycle_status,
};

/// Consolida os números do painel a partir da lista de contratos.
pub fn summarize(contracts: &[Contract], today: NaiveDate) -> DashboardSummary {
    let by_status = ContractStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: contracts.iter().filter(|c| c.status == *status).count() as i64,
        })
        .collect();

    let mut cycle = CycleCounts::default();
    let mut outstanding_balance = Decimal::ZERO;
    let mut fines_accrued = Decimal::ZERO;

    for contract in contracts {
        match cycle_status(contract, today) {
            Some(CycleStatus::Ok) => cycle.ok += 1,
            Some(CycleStatus::Due) => cycle.due += 1,
            Some(CycleStatus::Overdue) => cycle.overdue += 1,
            None => {}
        }
        if contract.status != ContractStatus::Cancelled {
            outstanding_balance += contract.balance;
            fines_accrued += contract.fine_amount;
        }
    }

    DashboardSummary {
        by_status,
        cycle,
        outstanding_balance,
        fines_accrued,
    }
}

#[derive(Clone)]
pub struct DashboardService {
    contracts: Arc<dyn ContractStore>,
}

impl DashboardService {
    pub fn new(contracts: Arc<dyn ContractStore>) -> Self {
        Self { contracts }
    }

    pub async fn get_summary(&self, today: NaiveDate) -> Result<DashboardSummary, AppError> {
        let contracts = self.contracts.list_contracts(&[]).await?;
        Ok(summarize(&contracts, today))
    }
}
