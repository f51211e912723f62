// src/models/visit.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::{models::contract::StatusChange, services::fines::Totals};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "visit_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    Normal,
    ShopClosed,
}

// --- VISITA (Check-in de campo) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: i64,
    pub contract_id: i64,
    pub technician_id: Option<i64>,

    #[schema(example = 25.2769)]
    pub latitude: f64,
    #[schema(example = 55.2962)]
    pub longitude: f64,
    /// Distância até o local do contrato, quando o local tem coordenadas válidas.
    #[schema(example = 42.5)]
    pub distance_m: Option<f64>,

    pub visit_type: VisitType,
    pub remarks: Option<String>,
    pub payment_collected: bool,
    pub payment_amount: Option<Decimal>,

    /// Dentro do raio de check-in e do tipo normal: conta como visita efetiva.
    pub verified: bool,
    pub visited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewVisit {
    pub contract_id: i64,
    pub technician_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_m: Option<f64>,
    pub visit_type: VisitType,
    pub remarks: Option<String>,
    pub payment_collected: bool,
    pub payment_amount: Option<Decimal>,
    pub verified: bool,
    pub visited_at: DateTime<Utc>,
}

/// Dados do check-in enviados pelo app do técnico.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckIn {
    pub technician_id: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub visit_type: VisitType,
    pub remarks: Option<String>,
    pub payment_amount: Option<Decimal>,
}

/// O que uma visita qualificada altera no contrato, na mesma transação da visita.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitEffect {
    pub last_effective_visit_date: NaiveDate,
    pub next_due_date: NaiveDate,
    /// due_soon/overdue voltam para active.
    pub reactivation: Option<StatusChange>,
}

/// Pagamento recebido no check-in; gravado com a visita, condicionado ao valor pago lido.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitPayment {
    pub payment: NewPayment,
    pub expected_paid: Decimal,
    pub totals: Totals,
}

// --- PAGAMENTO ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub contract_id: i64,
    #[schema(example = "500.00")]
    pub amount: Decimal,
    #[schema(example = "cash")]
    pub method: Option<String>,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub contract_id: i64,
    pub amount: Decimal,
    pub method: Option<String>,
    pub paid_at: DateTime<Utc>,
}
