// src/services/visit_service.rs

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ContractStore, CustomerStore},
    models::{
        contract::{Contract, ContractStatus, StatusChange},
        visit::{CheckIn, NewPayment, NewVisit, Payment, Visit, VisitEffect, VisitPayment, VisitType},
    },
    services::{
        coordinates::distance_meters,
        fines::{compute_totals, next_visit_due},
        lifecycle_service::validate_transition,
    },
};

#[derive(Clone)]
pub struct VisitService {
    contracts: Arc<dyn ContractStore>,
    customers: Arc<dyn CustomerStore>,
    checkin_radius_m: f64,
    utc_offset: FixedOffset,
}

impl VisitService {
    pub fn new(
        contracts: Arc<dyn ContractStore>,
        customers: Arc<dyn CustomerStore>,
        checkin_radius_m: f64,
        utc_offset: FixedOffset,
    ) -> Self {
        Self { contracts, customers, checkin_radius_m, utc_offset }
    }

    async fn load(&self, id: i64) -> Result<Contract, AppError> {
        self.contracts
            .find_contract(id)
            .await?
            .ok_or(AppError::ContractNotFound(id))
    }

    /// Registra o check-in. Uma visita normal dentro do raio é efetiva: avança o ciclo
    /// e devolve contratos due_soon/overdue para active. Visita, efeito e pagamento recebido
    /// são gravados juntos, condicionados ao status e ao valor pago lidos aqui.
    pub async fn record_visit(
        &self,
        contract_id: i64,
        check_in: &CheckIn,
        actor: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<Visit, AppError> {
        let contract = self.load(contract_id).await?;
        if !contract.status.is_live() {
            return Err(AppError::ContractNotLive {
                id: contract_id,
                status: contract.status,
            });
        }

        let site = self
            .customers
            .find_location(contract.location_id)
            .await?
            .and_then(|l| l.coordinates());
        let distance_m = site.map(|s| distance_meters(s, (check_in.latitude, check_in.longitude)));
        let verified = check_in.visit_type == VisitType::Normal
            && distance_m.is_some_and(|d| d <= self.checkin_radius_m);

        let effect = if verified {
            let today = at.with_timezone(&self.utc_offset).date_naive();
            let reactivation = match contract.status {
                ContractStatus::DueSoon | ContractStatus::Overdue => {
                    validate_transition(contract.status, ContractStatus::Active)?;
                    Some(StatusChange {
                        contract_id,
                        from: contract.status,
                        to: ContractStatus::Active,
                        actor,
                        at,
                    })
                }
                _ => None,
            };
            Some(VisitEffect {
                last_effective_visit_date: today,
                next_due_date: next_visit_due(today),
                reactivation,
            })
        } else {
            None
        };

        let payment_amount = check_in.payment_amount.filter(|a| *a > Decimal::ZERO);
        let payment = payment_amount.map(|amount| VisitPayment {
            payment: NewPayment {
                contract_id,
                amount,
                method: Some("visit".to_string()),
                paid_at: at,
            },
            expected_paid: contract.paid_amount,
            totals: compute_totals(
                contract.govt_fee,
                contract.amc_value,
                contract.fine_amount,
                contract.paid_amount + amount,
            ),
        });

        let visit = self
            .contracts
            .record_visit(
                &NewVisit {
                    contract_id,
                    technician_id: check_in.technician_id,
                    latitude: check_in.latitude,
                    longitude: check_in.longitude,
                    distance_m,
                    visit_type: check_in.visit_type,
                    remarks: check_in.remarks.clone(),
                    payment_collected: payment_amount.is_some(),
                    payment_amount,
                    verified,
                    visited_at: at,
                },
                contract.status,
                effect.as_ref(),
                payment.as_ref(),
            )
            .await?;

        tracing::info!(contract_id, verified, distance_m = ?distance_m, payment = ?payment_amount, "Visita registrada");

        Ok(visit)
    }

    pub async fn record_payment(
        &self,
        contract_id: i64,
        amount: Decimal,
        method: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<Payment, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest("Payment amount must be positive.".to_string()));
        }

        let contract = self.load(contract_id).await?;
        let totals = compute_totals(
            contract.govt_fee,
            contract.amc_value,
            contract.fine_amount,
            contract.paid_amount + amount,
        );

        let payment = self
            .contracts
            .record_payment(
                &NewPayment {
                    contract_id,
                    amount,
                    method,
                    paid_at: at,
                },
                contract.paid_amount,
                &totals,
            )
            .await?;

        tracing::info!(contract_id, %amount, balance = %totals.balance, "Pagamento registrado");
        Ok(payment)
    }
}
