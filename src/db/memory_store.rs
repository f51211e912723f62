// src/db/memory_store.rs
//
// Implementação em memória dos repositórios, para os testes dos serviços.
// Reproduz as regras do schema: chaves únicas, evento "created"/"updated" do trigger,
// cascatas e transações tudo-ou-nada.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard,
};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{ContractStore, CustomerStore, ImportStore},
    models::{
        contract::{Contract, ContractEvent, ContractStatus, NewContract, StatusChange},
        customer::{Customer, Location, MergeOutcome, NewCustomer, NewLocation, TechnicianArea},
        import::{ImportCounters, ImportRun, ImportRunItem, NewImportRunItem},
        visit::{NewPayment, NewVisit, Payment, Visit, VisitEffect, VisitPayment},
    },
    services::fines::Totals,
};

#[derive(Default)]
struct State {
    next_id: i64,
    customers: Vec<Customer>,
    locations: Vec<Location>,
    technician_areas: Vec<TechnicianArea>,
    contracts: Vec<Contract>,
    events: Vec<ContractEvent>,
    visits: Vec<Visit>,
    payments: Vec<Payment>,
    runs: Vec<ImportRun>,
    run_items: Vec<ImportRunItem>,
}

impl State {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn push_event(&mut self, contract_id: i64, event_type: &str, metadata: serde_json::Value) {
        let id = self.id();
        self.events.push(ContractEvent {
            id,
            contract_id,
            event_type: event_type.to_string(),
            metadata,
            created_at: Utc::now(),
        });
    }

    fn contract_mut(&mut self, id: i64) -> Result<&mut Contract, AppError> {
        self.contracts
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(AppError::ContractNotFound(id))
    }

    fn check_change(&self, change: &StatusChange) -> Result<(), AppError> {
        match self.contracts.iter().find(|c| c.id == change.contract_id) {
            None => Err(AppError::ContractNotFound(change.contract_id)),
            Some(c) if c.status != change.from => Err(AppError::StaleState(change.contract_id)),
            Some(_) => Ok(()),
        }
    }

    /// Só chamar depois de `check_change`.
    fn apply_change(&mut self, change: &StatusChange) -> Result<(), AppError> {
        let contract = self.contract_mut(change.contract_id)?;
        contract.status = change.to;
        if let Some(at) = change.terminated_at() {
            contract.terminated_at = Some(at);
        }
        contract.updated_at = Utc::now();
        self.push_event(change.contract_id, change.to.as_str(), change.metadata());
        Ok(())
    }

    fn check_payment(&self, contract_id: i64, expected_paid: Decimal) -> Result<(), AppError> {
        match self.contracts.iter().find(|c| c.id == contract_id) {
            None => Err(AppError::ContractNotFound(contract_id)),
            Some(c) if c.paid_amount != expected_paid => Err(AppError::StaleState(contract_id)),
            Some(_) => Ok(()),
        }
    }

    /// Só chamar depois de `check_payment`.
    fn apply_payment(&mut self, payment: &NewPayment, totals: &Totals) -> Result<Payment, AppError> {
        let contract = self.contract_mut(payment.contract_id)?;
        contract.paid_amount += payment.amount;
        contract.total_amount = totals.total;
        contract.balance = totals.balance;
        self.push_event(payment.contract_id, "updated", json!({}));

        let saved = Payment {
            id: self.id(),
            contract_id: payment.contract_id,
            amount: payment.amount,
            method: payment.method.clone(),
            paid_at: payment.paid_at,
        };
        self.payments.push(saved.clone());
        Ok(saved)
    }

    fn insert_contract(&mut self, new: &NewContract) -> Result<Contract, AppError> {
        if let Some(prev) = new.renewal_of {
            if self.contracts.iter().any(|c| c.renewal_of == Some(prev)) {
                return Err(AppError::UniqueConstraintViolation(format!(
                    "Contract {prev} was already renewed."
                )));
            }
        }
        let now = Utc::now();
        let contract = Contract {
            id: self.id(),
            location_id: new.location_id,
            start_date: new.start_date,
            end_date: new.end_date,
            status: new.status,
            next_due_date: new.next_due_date,
            last_effective_visit_date: new.last_effective_visit_date,
            technician_id: new.technician_id,
            govt_fee: new.govt_fee,
            amc_value: new.amc_value,
            fine_amount: new.fine_amount,
            total_amount: new.total_amount,
            paid_amount: new.paid_amount,
            balance: new.balance,
            renewal_of: new.renewal_of,
            terminated_at: None,
            created_at: now,
            updated_at: now,
        };
        self.contracts.push(contract.clone());
        self.push_event(contract.id, "created", json!({}));
        Ok(contract)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_next_contract_insert: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store poisoned")
    }

    /// Faz o próximo INSERT de contrato falhar (simula erro no meio de uma transação).
    pub fn fail_next_contract_insert(&self) {
        self.fail_next_contract_insert.store(true, Ordering::SeqCst);
    }

    fn take_insert_failure(&self) -> Result<(), AppError> {
        if self.fail_next_contract_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::InternalServerError(anyhow::anyhow!("injected insert failure")));
        }
        Ok(())
    }

    pub fn add_technician_area(&self, technician_id: i64, area: &str) {
        self.lock().technician_areas.push(TechnicianArea {
            technician_id,
            area: area.to_string(),
        });
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.lock().customers.clone()
    }

    pub fn locations(&self) -> Vec<Location> {
        self.lock().locations.clone()
    }

    pub fn contracts(&self) -> Vec<Contract> {
        self.lock().contracts.clone()
    }

    pub fn events_for(&self, contract_id: i64) -> Vec<ContractEvent> {
        self.lock().events.iter().filter(|e| e.contract_id == contract_id).cloned().collect()
    }

    pub fn runs(&self) -> Vec<ImportRun> {
        self.lock().runs.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.lock().payments.clone()
    }

    pub fn visits(&self) -> Vec<Visit> {
        self.lock().visits.clone()
    }

    /// Altera o status por fora (simula um escritor concorrente).
    pub fn force_status(&self, contract_id: i64, status: ContractStatus) {
        if let Some(c) = self.lock().contracts.iter_mut().find(|c| c.id == contract_id) {
            c.status = status;
        }
    }

    /// Reescreve datas para montar cenários da varredura.
    pub fn set_dates(&self, contract_id: i64, end_date: NaiveDate, next_due_date: Option<NaiveDate>) {
        if let Some(c) = self.lock().contracts.iter_mut().find(|c| c.id == contract_id) {
            c.end_date = end_date;
            c.next_due_date = next_due_date;
        }
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn list_customers(&self) -> Result<Vec<Customer>, AppError> {
        Ok(self.lock().customers.clone())
    }

    async fn find_customer(&self, id: i64) -> Result<Option<Customer>, AppError> {
        Ok(self.lock().customers.iter().find(|c| c.id == id).cloned())
    }

    async fn create_customer(&self, new: &NewCustomer) -> Result<Customer, AppError> {
        let mut state = self.lock();
        let clash = state.customers.iter().any(|c| {
            (new.license_number.is_some() && c.license_number == new.license_number)
                || (new.gra_number.is_some() && c.gra_number == new.gra_number)
        });
        if clash {
            return Err(AppError::UniqueConstraintViolation("duplicate customer key".into()));
        }
        let now = Utc::now();
        let customer = Customer {
            id: state.id(),
            name: new.name.clone(),
            license_number: new.license_number.clone(),
            gra_number: new.gra_number.clone(),
            phone: new.phone.clone(),
            area: new.area.clone(),
            created_at: now,
            updated_at: now,
        };
        state.customers.push(customer.clone());
        Ok(customer)
    }

    async fn delete_customer_if_orphan(&self, id: i64) -> Result<bool, AppError> {
        let mut state = self.lock();
        if state.locations.iter().any(|l| l.customer_id == id) {
            return Ok(false);
        }
        let before = state.customers.len();
        state.customers.retain(|c| c.id != id);
        Ok(state.customers.len() < before)
    }

    async fn merge_customers(&self, primary_id: i64, duplicate_ids: &[i64]) -> Result<MergeOutcome, AppError> {
        let mut state = self.lock();
        if !state.customers.iter().any(|c| c.id == primary_id) {
            return Err(AppError::CustomerNotFound(primary_id));
        }
        let duplicates: Vec<i64> = duplicate_ids.iter().copied().filter(|id| *id != primary_id).collect();

        let mut moved = 0;
        for location in state.locations.iter_mut().filter(|l| duplicates.contains(&l.customer_id)) {
            location.customer_id = primary_id;
            moved += 1;
        }
        let before = state.customers.len();
        state.customers.retain(|c| !duplicates.contains(&c.id));
        let removed = (before - state.customers.len()) as u64;

        Ok(MergeOutcome { primary_id, locations_moved: moved, customers_removed: removed })
    }

    async fn list_locations(&self, customer_id: i64) -> Result<Vec<Location>, AppError> {
        Ok(self.lock().locations.iter().filter(|l| l.customer_id == customer_id).cloned().collect())
    }

    async fn find_location(&self, id: i64) -> Result<Option<Location>, AppError> {
        Ok(self.lock().locations.iter().find(|l| l.id == id).cloned())
    }

    async fn create_location(&self, new: &NewLocation) -> Result<Location, AppError> {
        let mut state = self.lock();
        let location = Location {
            id: state.id(),
            customer_id: new.customer_id,
            name: new.name.clone(),
            address: new.address.clone(),
            latitude: new.latitude,
            longitude: new.longitude,
            coordinates_valid: new.coordinates_valid,
            coordinate_note: new.coordinate_note.clone(),
            govt_renewal_date: new.govt_renewal_date,
            created_at: Utc::now(),
        };
        state.locations.push(location.clone());
        Ok(location)
    }

    async fn delete_location_if_unused(&self, id: i64) -> Result<bool, AppError> {
        let mut state = self.lock();
        if state.contracts.iter().any(|c| c.location_id == id) {
            return Ok(false);
        }
        let before = state.locations.len();
        state.locations.retain(|l| l.id != id);
        Ok(state.locations.len() < before)
    }

    async fn list_technician_areas(&self) -> Result<Vec<TechnicianArea>, AppError> {
        Ok(self.lock().technician_areas.clone())
    }
}

#[async_trait]
impl ContractStore for MemoryStore {
    async fn find_contract(&self, id: i64) -> Result<Option<Contract>, AppError> {
        Ok(self.lock().contracts.iter().find(|c| c.id == id).cloned())
    }

    async fn list_contracts(&self, statuses: &[ContractStatus]) -> Result<Vec<Contract>, AppError> {
        Ok(self
            .lock()
            .contracts
            .iter()
            .filter(|c| statuses.is_empty() || statuses.contains(&c.status))
            .cloned()
            .collect())
    }

    async fn find_contract_by_location_and_start(
        &self,
        location_id: i64,
        start_date: NaiveDate,
    ) -> Result<Option<Contract>, AppError> {
        Ok(self
            .lock()
            .contracts
            .iter()
            .find(|c| c.location_id == location_id && c.start_date == start_date)
            .cloned())
    }

    async fn create_contract(&self, new: &NewContract) -> Result<Contract, AppError> {
        self.take_insert_failure()?;
        self.lock().insert_contract(new)
    }

    async fn apply_transition(&self, change: &StatusChange) -> Result<(), AppError> {
        let mut state = self.lock();
        state.check_change(change)?;
        state.apply_change(change)
    }

    async fn renew_contract(&self, replacement: &NewContract, change: &StatusChange) -> Result<i64, AppError> {
        let mut state = self.lock();
        // Valida tudo antes de escrever qualquer coisa
        state.check_change(change)?;
        self.take_insert_failure()?;
        let created = state.insert_contract(replacement)?;
        state.apply_change(change)?;
        Ok(created.id)
    }

    async fn delete_contract(&self, id: i64) -> Result<bool, AppError> {
        let mut state = self.lock();
        let before = state.contracts.len();
        state.contracts.retain(|c| c.id != id);
        let removed = state.contracts.len() < before;
        if removed {
            state.events.retain(|e| e.contract_id != id);
            state.visits.retain(|v| v.contract_id != id);
            state.payments.retain(|p| p.contract_id != id);
            for c in state.contracts.iter_mut().filter(|c| c.renewal_of == Some(id)) {
                c.renewal_of = None;
            }
        }
        Ok(removed)
    }

    async fn list_events(&self, contract_id: i64) -> Result<Vec<ContractEvent>, AppError> {
        Ok(self.events_for(contract_id))
    }

    async fn record_visit(
        &self,
        visit: &NewVisit,
        expected_status: ContractStatus,
        effect: Option<&VisitEffect>,
        payment: Option<&VisitPayment>,
    ) -> Result<Visit, AppError> {
        let mut state = self.lock();

        // Todas as checagens antes de qualquer escrita: falhou, nada muda
        match state.contracts.iter().find(|c| c.id == visit.contract_id) {
            None => return Err(AppError::ContractNotFound(visit.contract_id)),
            Some(c) if c.status != expected_status => {
                return Err(AppError::StaleState(visit.contract_id));
            }
            Some(_) => {}
        }
        if let Some(change) = effect.and_then(|e| e.reactivation.as_ref()) {
            state.check_change(change)?;
        }
        if let Some(collected) = payment {
            state.check_payment(visit.contract_id, collected.expected_paid)?;
        }

        if let Some(effect) = effect {
            if let Some(change) = &effect.reactivation {
                state.apply_change(change)?;
            }
            let contract = state.contract_mut(visit.contract_id)?;
            contract.last_effective_visit_date = Some(effect.last_effective_visit_date);
            contract.next_due_date = Some(effect.next_due_date);
            state.push_event(visit.contract_id, "updated", json!({}));
        }

        if let Some(collected) = payment {
            state.apply_payment(&collected.payment, &collected.totals)?;
        }

        let saved = Visit {
            id: state.id(),
            contract_id: visit.contract_id,
            technician_id: visit.technician_id,
            latitude: visit.latitude,
            longitude: visit.longitude,
            distance_m: visit.distance_m,
            visit_type: visit.visit_type,
            remarks: visit.remarks.clone(),
            payment_collected: visit.payment_collected,
            payment_amount: visit.payment_amount,
            verified: visit.verified,
            visited_at: visit.visited_at,
        };
        state.visits.push(saved.clone());
        Ok(saved)
    }

    async fn record_payment(
        &self,
        payment: &NewPayment,
        expected_paid: Decimal,
        totals: &Totals,
    ) -> Result<Payment, AppError> {
        let mut state = self.lock();
        state.check_payment(payment.contract_id, expected_paid)?;
        state.apply_payment(payment, totals)
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    async fn create_run(&self, initiated_by: Option<Uuid>) -> Result<ImportRun, AppError> {
        let mut state = self.lock();
        let run = ImportRun {
            id: state.id(),
            total_rows: 0,
            valid_rows: 0,
            invalid_rows: 0,
            skipped_rows: 0,
            new_customers: 0,
            existing_customers: 0,
            new_locations: 0,
            existing_locations: 0,
            contracts_created: 0,
            duplicate_contracts: 0,
            renewed: 0,
            not_renewed: 0,
            dry_run: false,
            initiated_by,
            created_at: Utc::now(),
            completed_at: None,
        };
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn add_run_item(&self, item: &NewImportRunItem) -> Result<(), AppError> {
        let mut state = self.lock();
        let id = state.id();
        state.run_items.push(ImportRunItem {
            id,
            import_run_id: item.import_run_id,
            customer_id: item.customer_id,
            location_id: item.location_id,
            contract_id: item.contract_id,
        });
        Ok(())
    }

    async fn finish_run(&self, run_id: i64, counters: &ImportCounters) -> Result<(), AppError> {
        let mut state = self.lock();
        if let Some(run) = state.runs.iter_mut().find(|r| r.id == run_id) {
            run.apply_counters(counters);
            run.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn find_run(&self, id: i64) -> Result<Option<ImportRun>, AppError> {
        Ok(self.lock().runs.iter().find(|r| r.id == id).cloned())
    }

    async fn list_runs(&self) -> Result<Vec<ImportRun>, AppError> {
        Ok(self.lock().runs.clone())
    }

    async fn list_run_items(&self, run_id: i64) -> Result<Vec<ImportRunItem>, AppError> {
        Ok(self.lock().run_items.iter().filter(|i| i.import_run_id == run_id).cloned().collect())
    }

    async fn delete_run(&self, id: i64) -> Result<bool, AppError> {
        let mut state = self.lock();
        let before = state.runs.len();
        state.runs.retain(|r| r.id != id);
        state.run_items.retain(|i| i.import_run_id != id);
        Ok(state.runs.len() < before)
    }
}
