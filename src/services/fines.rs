// src/services/fines.rs

use chrono::{Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::config::FineRates;

/// Janela após o vencimento sem multa.
pub const GRACE_PERIOD_DAYS: i64 = 30;
/// Cada mês de atraso além da carência é contado em blocos de 30 dias.
pub const FINE_MONTH_DAYS: i64 = 30;
/// Intervalo padrão entre visitas de manutenção.
pub const VISIT_CYCLE_DAYS: u64 = 90;

/// Seletor de taxa da UI (200/160); não é um algoritmo separado.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RateTier {
    #[default]
    Standard,
    Reduced,
}

impl RateTier {
    pub fn monthly_rate(&self, rates: &FineRates) -> Decimal {
        match self {
            RateTier::Standard => rates.standard,
            RateTier::Reduced => rates.reduced,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub total: Decimal,
    pub balance: Decimal,
}

pub fn compute_renewal_fine(
    new_start_date: NaiveDate,
    previous_expiry_date: NaiveDate,
    monthly_rate: Decimal,
) -> Decimal {
    let days_late = (new_start_date - previous_expiry_date).num_days();
    if days_late <= GRACE_PERIOD_DAYS {
        return Decimal::ZERO;
    }

    let overdue_days = days_late - GRACE_PERIOD_DAYS;
    let months_late = (overdue_days + FINE_MONTH_DAYS - 1) / FINE_MONTH_DAYS;
    (Decimal::from(months_late) * monthly_rate).max(Decimal::ZERO)
}

pub fn compute_totals(govt_fee: Decimal, amc_value: Decimal, fine: Decimal, paid: Decimal) -> Totals {
    let total = govt_fee + amc_value + fine;
    Totals { total, balance: total - paid }
}

/// Fim nominal do contrato: um ano após o início.
pub fn contract_end_date(start: NaiveDate) -> NaiveDate {
    start + Months::new(12)
}

/// Próxima visita devida a partir de uma data de referência.
pub fn next_visit_due(from: NaiveDate) -> NaiveDate {
    from + Days::new(VISIT_CYCLE_DAYS)
}
