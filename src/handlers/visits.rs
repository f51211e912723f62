// src/handlers/visits.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::contracts::validate_not_negative,
    middleware::actor::Actor,
    models::visit::{CheckIn, Payment, Visit, VisitType},
};

fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.message = Some("Amount must be greater than zero.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitPayload {
    pub technician_id: Option<i64>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range."))]
    pub latitude: f64,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range."))]
    pub longitude: f64,

    // Ausente = visita normal
    pub visit_type: Option<VisitType>,

    #[validate(length(max = 1000))]
    pub remarks: Option<String>,

    #[validate(custom(function = "validate_not_negative"))]
    pub payment_amount: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    #[validate(custom(function = "validate_positive"))]
    pub amount: Decimal,

    #[validate(length(min = 1, max = 50, message = "Method must have 1 to 50 characters."))]
    pub method: Option<String>,
}

// POST /api/contracts/{id}/visits
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/visits",
    tag = "Visits",
    request_body = VisitPayload,
    params(
        ("id" = i64, Path, description = "Contract id"),
        ("x-user-id" = Option<String>, Header, description = "Acting user (uuid)")
    ),
    responses(
        (status = 201, description = "Visit recorded; verified visits advance the cycle", body = Visit),
        (status = 404, description = "Contract not found"),
        (status = 422, description = "Contract is not live")
    )
)]
pub async fn record_visit(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Actor(actor): Actor,
    Json(payload): Json<VisitPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let check_in = CheckIn {
        technician_id: payload.technician_id,
        latitude: payload.latitude,
        longitude: payload.longitude,
        visit_type: payload.visit_type.unwrap_or(VisitType::Normal),
        remarks: payload.remarks,
        payment_amount: payload.payment_amount,
    };

    let visit = app_state
        .visit_service
        .record_visit(id, &check_in, actor, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(visit)))
}

// POST /api/contracts/{id}/payments
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/payments",
    tag = "Visits",
    request_body = PaymentPayload,
    params(("id" = i64, Path, description = "Contract id")),
    responses(
        (status = 201, description = "Payment recorded and balance updated", body = Payment),
        (status = 404, description = "Contract not found"),
        (status = 409, description = "Balance changed concurrently")
    )
)]
pub async fn record_payment(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PaymentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let payment = app_state
        .visit_service
        .record_payment(id, payload.amount, payload.method, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_outside_the_globe_fail_validation() {
        let payload: VisitPayload =
            serde_json::from_str(r#"{"latitude":95.0,"longitude":55.3}"#).unwrap();
        assert!(payload.validate().is_err());

        let payload: VisitPayload =
            serde_json::from_str(r#"{"latitude":25.2,"longitude":55.3,"visitType":"shop_closed"}"#)
                .unwrap();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.visit_type, Some(VisitType::ShopClosed));
    }

    #[test]
    fn payments_must_be_positive() {
        let payload: PaymentPayload = serde_json::from_str(r#"{"amount":0}"#).unwrap();
        assert!(payload.validate().is_err());
    }
}
