// src/services/lifecycle_service.rs
//
// Máquina de estados do contrato. As regras vivem numa tabela em código;
// o banco só aplica a atualização condicional + evento.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::FineRates,
    db::{ContractStore, CustomerStore},
    models::contract::{
        Contract, ContractEvent, ContractStatus, ContractView, CycleStatus, DraftContract,
        NewContract, StatusChange, SweepReport,
    },
    services::fines::{
        compute_renewal_fine, compute_totals, contract_end_date, next_visit_due, RateTier,
    },
};

/// Janela (dias) em que uma visita devida passa a `due_soon`.
pub const DUE_SOON_WINDOW_DAYS: u64 = 7;

/// Destinos permitidos a partir de cada status.
pub fn allowed_targets(from: ContractStatus) -> &'static [ContractStatus] {
    use ContractStatus::*;
    match from {
        Draft => &[Active, Cancelled],
        Active => &[DueSoon, Overdue, Expired, Cancelled, Renewed],
        DueSoon => &[Active, Overdue, Expired, Cancelled, Renewed],
        Overdue => &[Active, Expired, Cancelled, Renewed],
        Expired => &[Renewed],
        Renewed | Cancelled => &[],
    }
}

pub fn can_transition(from: ContractStatus, to: ContractStatus) -> bool {
    allowed_targets(from).contains(&to)
}

pub fn validate_transition(from: ContractStatus, to: ContractStatus) -> Result<(), AppError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition { from, to })
    }
}

fn due_soon_limit(today: NaiveDate) -> NaiveDate {
    today + Days::new(DUE_SOON_WINDOW_DAYS)
}

/// Para onde a varredura diária leva o contrato hoje, se para algum lugar.
/// Ordem: vencimento do contrato, depois visita próxima, depois visita atrasada.
pub fn sweep_target(contract: &Contract, today: NaiveDate) -> Option<ContractStatus> {
    use ContractStatus::*;

    if contract.status.is_live() && contract.end_date < today {
        return Some(Expired);
    }

    let next_due = contract.next_due_date?;
    match contract.status {
        Active if next_due >= today && next_due <= due_soon_limit(today) => Some(DueSoon),
        Active | DueSoon if next_due < today => Some(Overdue),
        _ => None,
    }
}

/// Rótulo de ciclo (ok/due/overdue); só faz sentido para contratos em vigor.
pub fn cycle_status(contract: &Contract, today: NaiveDate) -> Option<CycleStatus> {
    if !contract.status.is_live() {
        return None;
    }
    let next_due = contract.next_due_date?;
    Some(if next_due < today {
        CycleStatus::Overdue
    } else if next_due <= due_soon_limit(today) {
        CycleStatus::Due
    } else {
        CycleStatus::Ok
    })
}

#[derive(Clone)]
pub struct LifecycleService {
    contracts: Arc<dyn ContractStore>,
    customers: Arc<dyn CustomerStore>,
    fine_rates: FineRates,
}

impl LifecycleService {
    pub fn new(
        contracts: Arc<dyn ContractStore>,
        customers: Arc<dyn CustomerStore>,
        fine_rates: FineRates,
    ) -> Self {
        Self { contracts, customers, fine_rates }
    }

    async fn load(&self, id: i64) -> Result<Contract, AppError> {
        self.contracts
            .find_contract(id)
            .await?
            .ok_or(AppError::ContractNotFound(id))
    }

    // =========================================================================
    //  TRANSIÇÕES
    // =========================================================================

    pub async fn set_status(
        &self,
        id: i64,
        to: ContractStatus,
        actor: Option<Uuid>,
    ) -> Result<(), AppError> {
        let current = self.load(id).await?;
        validate_transition(current.status, to)?;

        let change = StatusChange {
            contract_id: id,
            from: current.status,
            to,
            actor,
            at: Utc::now(),
        };
        self.contracts.apply_transition(&change).await?;

        tracing::info!(contract_id = id, from = %change.from, to = %change.to, "Status do contrato alterado");
        Ok(())
    }

    /// Cria o sucessor e marca o antecessor como `renewed`, na mesma transação.
    pub async fn renew_contract(
        &self,
        old_id: i64,
        new_start_date: NaiveDate,
        tier: RateTier,
        actor: Option<Uuid>,
    ) -> Result<i64, AppError> {
        let old = self.load(old_id).await?;
        validate_transition(old.status, ContractStatus::Renewed)?;

        let fine = compute_renewal_fine(
            new_start_date,
            old.end_date,
            tier.monthly_rate(&self.fine_rates),
        );
        let totals = compute_totals(old.govt_fee, old.amc_value, fine, Decimal::ZERO);

        let replacement = NewContract {
            location_id: old.location_id,
            start_date: new_start_date,
            end_date: contract_end_date(new_start_date),
            status: ContractStatus::Active,
            next_due_date: Some(next_visit_due(new_start_date)),
            last_effective_visit_date: Some(new_start_date),
            technician_id: old.technician_id,
            govt_fee: old.govt_fee,
            amc_value: old.amc_value,
            fine_amount: fine,
            total_amount: totals.total,
            paid_amount: Decimal::ZERO,
            balance: totals.balance,
            renewal_of: Some(old_id),
        };
        let change = StatusChange {
            contract_id: old_id,
            from: old.status,
            to: ContractStatus::Renewed,
            actor,
            at: Utc::now(),
        };

        let new_id = self.contracts.renew_contract(&replacement, &change).await?;

        tracing::info!(old_id, new_id, %fine, "Contrato renovado");
        Ok(new_id)
    }

    /// Varredura diária. Falhas por contrato são registradas e contadas, nunca fatais.
    pub async fn daily_sweep(&self, today: NaiveDate) -> Result<SweepReport, AppError> {
        let live = self
            .contracts
            .list_contracts(&[
                ContractStatus::Active,
                ContractStatus::DueSoon,
                ContractStatus::Overdue,
            ])
            .await?;

        let mut report = SweepReport::default();
        let now = Utc::now();

        for contract in &live {
            let Some(to) = sweep_target(contract, today) else { continue };

            let change = StatusChange {
                contract_id: contract.id,
                from: contract.status,
                to,
                actor: None,
                at: now,
            };
            let result = match validate_transition(change.from, to) {
                Ok(()) => self.contracts.apply_transition(&change).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => match to {
                    ContractStatus::Expired => report.expired += 1,
                    ContractStatus::DueSoon => report.due_soon += 1,
                    _ => report.overdue += 1,
                },
                Err(e) if e.is_systemic() => return Err(e),
                Err(e) => {
                    tracing::warn!(contract_id = contract.id, to = %to, error = %e, "Falha na varredura");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            expired = report.expired,
            due_soon = report.due_soon,
            overdue = report.overdue,
            failed = report.failed,
            "Varredura diária concluída"
        );
        Ok(report)
    }

    // =========================================================================
    //  CRUD
    // =========================================================================

    pub async fn create_draft(&self, draft: &DraftContract) -> Result<Contract, AppError> {
        let location = self
            .customers
            .find_location(draft.location_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Location {} not found.", draft.location_id)))?;
        if location.coordinates().is_none() {
            return Err(AppError::BadRequest(format!(
                "Location {} has no valid coordinates; fix them before creating a contract.",
                location.id
            )));
        }

        let totals = compute_totals(draft.govt_fee, draft.amc_value, Decimal::ZERO, Decimal::ZERO);
        let new = NewContract {
            location_id: location.id,
            start_date: draft.start_date,
            end_date: contract_end_date(draft.start_date),
            status: ContractStatus::Draft,
            next_due_date: Some(next_visit_due(draft.start_date)),
            last_effective_visit_date: None,
            technician_id: draft.technician_id,
            govt_fee: draft.govt_fee,
            amc_value: draft.amc_value,
            fine_amount: Decimal::ZERO,
            total_amount: totals.total,
            paid_amount: Decimal::ZERO,
            balance: totals.balance,
            renewal_of: None,
        };

        self.contracts.create_contract(&new).await
    }

    pub async fn get_contract(&self, id: i64, today: NaiveDate) -> Result<ContractView, AppError> {
        let contract = self.load(id).await?;
        let cycle_status = cycle_status(&contract, today);
        Ok(ContractView { contract, cycle_status })
    }

    pub async fn list_contracts(
        &self,
        statuses: &[ContractStatus],
        today: NaiveDate,
    ) -> Result<Vec<ContractView>, AppError> {
        let contracts = self.contracts.list_contracts(statuses).await?;
        Ok(contracts
            .into_iter()
            .map(|contract| ContractView {
                cycle_status: cycle_status(&contract, today),
                contract,
            })
            .collect())
    }

    pub async fn list_events(&self, id: i64) -> Result<Vec<ContractEvent>, AppError> {
        self.load(id).await?;
        self.contracts.list_events(id).await
    }

    pub async fn delete_contract(&self, id: i64) -> Result<(), AppError> {
        if !self.contracts.delete_contract(id).await? {
            return Err(AppError::ContractNotFound(id));
        }
        tracing::warn!(contract_id = id, "Contrato removido");
        Ok(())
    }
}
