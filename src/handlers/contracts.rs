// src/handlers/contracts.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::actor::Actor,
    models::contract::{
        Contract, ContractEvent, ContractStatus, ContractView, DraftContract, RenewalResponse,
        SweepReport,
    },
    services::fines::RateTier,
};

pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("Value cannot be negative.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub status: ContractStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenewPayload {
    #[schema(value_type = String, format = Date, example = "2025-02-20")]
    pub new_start_date: NaiveDate,
    /// Faixa da multa mensal (standard = 200, reduced = 160 por padrão).
    #[serde(default)]
    pub rate_tier: RateTier,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractPayload {
    #[validate(range(min = 1, message = "Field 'locationId' is required."))]
    pub location_id: i64,

    #[schema(value_type = String, format = Date, example = "2024-01-15")]
    pub start_date: NaiveDate,

    pub technician_id: Option<i64>,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub govt_fee: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub amc_value: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ContractListQuery {
    pub status: Option<ContractStatus>,
}

// ---
// Handlers
// ---

// POST /api/contracts/{id}/status
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/status",
    tag = "Contracts",
    request_body = StatusPayload,
    params(
        ("id" = i64, Path, description = "Contract id"),
        ("x-user-id" = Option<String>, Header, description = "Acting user (uuid)")
    ),
    responses(
        (status = 204, description = "Status changed and audit event recorded"),
        (status = 404, description = "Contract not found"),
        (status = 409, description = "Contract changed concurrently"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn set_status(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Actor(actor): Actor,
    Json(payload): Json<StatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .lifecycle_service
        .set_status(id, payload.status, actor)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// POST /api/contracts/{id}/renew
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/renew",
    tag = "Contracts",
    request_body = RenewPayload,
    params(
        ("id" = i64, Path, description = "Contract being renewed"),
        ("x-user-id" = Option<String>, Header, description = "Acting user (uuid)")
    ),
    responses(
        (status = 201, description = "Successor contract created", body = RenewalResponse),
        (status = 404, description = "Contract not found"),
        (status = 409, description = "Already renewed or changed concurrently"),
        (status = 422, description = "Contract cannot be renewed from its current status")
    )
)]
pub async fn renew_contract(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Actor(actor): Actor,
    Json(payload): Json<RenewPayload>,
) -> Result<impl IntoResponse, AppError> {
    let new_contract_id = app_state
        .lifecycle_service
        .renew_contract(id, payload.new_start_date, payload.rate_tier, actor)
        .await?;

    Ok((StatusCode::CREATED, Json(RenewalResponse { new_contract_id })))
}

// POST /api/contracts
#[utoipa::path(
    post,
    path = "/api/contracts",
    tag = "Contracts",
    request_body = CreateContractPayload,
    responses(
        (status = 201, description = "Draft contract created", body = Contract),
        (status = 400, description = "Invalid payload or unusable location")
    )
)]
pub async fn create_contract(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateContractPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let contract = app_state
        .lifecycle_service
        .create_draft(&DraftContract {
            location_id: payload.location_id,
            start_date: payload.start_date,
            technician_id: payload.technician_id,
            govt_fee: payload.govt_fee,
            amc_value: payload.amc_value,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(contract)))
}

// GET /api/contracts
#[utoipa::path(
    get,
    path = "/api/contracts",
    tag = "Contracts",
    params(
        ("status" = Option<ContractStatus>, Query, description = "Only contracts in this status")
    ),
    responses(
        (status = 200, description = "Contracts with derived cycle status", body = Vec<ContractView>)
    )
)]
pub async fn list_contracts(
    State(app_state): State<AppState>,
    Query(query): Query<ContractListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let statuses: Vec<ContractStatus> = query.status.into_iter().collect();
    let contracts = app_state
        .lifecycle_service
        .list_contracts(&statuses, app_state.settings.today())
        .await?;

    Ok((StatusCode::OK, Json(contracts)))
}

// GET /api/contracts/{id}
#[utoipa::path(
    get,
    path = "/api/contracts/{id}",
    tag = "Contracts",
    params(("id" = i64, Path, description = "Contract id")),
    responses(
        (status = 200, description = "Contract detail", body = ContractView),
        (status = 404, description = "Contract not found")
    )
)]
pub async fn get_contract(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let contract = app_state
        .lifecycle_service
        .get_contract(id, app_state.settings.today())
        .await?;

    Ok((StatusCode::OK, Json(contract)))
}

// GET /api/contracts/{id}/events
#[utoipa::path(
    get,
    path = "/api/contracts/{id}/events",
    tag = "Contracts",
    params(("id" = i64, Path, description = "Contract id")),
    responses(
        (status = 200, description = "Audit trail, oldest first", body = Vec<ContractEvent>),
        (status = 404, description = "Contract not found")
    )
)]
pub async fn list_events(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let events = app_state.lifecycle_service.list_events(id).await?;
    Ok((StatusCode::OK, Json(events)))
}

// DELETE /api/contracts/{id}
#[utoipa::path(
    delete,
    path = "/api/contracts/{id}",
    tag = "Contracts",
    params(("id" = i64, Path, description = "Contract id")),
    responses(
        (status = 204, description = "Contract and its visits, payments and events removed"),
        (status = 404, description = "Contract not found")
    )
)]
pub async fn delete_contract(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    app_state.lifecycle_service.delete_contract(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/contracts/sweep
#[utoipa::path(
    post,
    path = "/api/contracts/sweep",
    tag = "Contracts",
    responses(
        (status = 200, description = "Transitions applied by the daily sweep", body = SweepReport)
    )
)]
pub async fn run_sweep(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let report = app_state
        .lifecycle_service
        .daily_sweep(app_state.settings.today())
        .await?;

    Ok((StatusCode::OK, Json(report)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renew_payload_defaults_to_standard_rate() {
        let payload: RenewPayload =
            serde_json::from_str(r#"{"newStartDate":"2025-02-20"}"#).unwrap();
        assert_eq!(payload.rate_tier, RateTier::Standard);

        let payload: RenewPayload =
            serde_json::from_str(r#"{"newStartDate":"2025-02-20","rateTier":"reduced"}"#).unwrap();
        assert_eq!(payload.rate_tier, RateTier::Reduced);
    }

    #[test]
    fn negative_fees_fail_validation() {
        let payload: CreateContractPayload = serde_json::from_str(
            r#"{"locationId":3,"startDate":"2024-01-15","govtFee":-1}"#,
        )
        .unwrap();
        assert!(payload.validate().is_err());
    }
}
