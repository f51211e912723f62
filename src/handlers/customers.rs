// src/handlers/customers.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::customer::{Customer, DuplicateGroup, Location, MergeOutcome},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MergePayload {
    pub primary_id: i64,

    #[validate(length(min = 1, message = "Select at least one duplicate."))]
    pub duplicate_ids: Vec<i64>,
}

// GET /api/customers
#[utoipa::path(
    get,
    path = "/api/customers",
    tag = "Customers",
    responses((status = 200, description = "All customers", body = Vec<Customer>))
)]
pub async fn list_customers(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let customers = app_state.customer_service.list_customers().await?;
    Ok((StatusCode::OK, Json(customers)))
}

// GET /api/customers/{id}/locations
#[utoipa::path(
    get,
    path = "/api/customers/{id}/locations",
    tag = "Customers",
    params(("id" = i64, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Sites of the customer", body = Vec<Location>),
        (status = 404, description = "Customer not found")
    )
)]
pub async fn list_locations(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let locations = app_state.customer_service.list_locations(id).await?;
    Ok((StatusCode::OK, Json(locations)))
}

// GET /api/customers/duplicates
#[utoipa::path(
    get,
    path = "/api/customers/duplicates",
    tag = "Customers",
    responses((status = 200, description = "Groups sharing license, GRA or name", body = Vec<DuplicateGroup>))
)]
pub async fn list_duplicates(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let groups = app_state.customer_service.find_duplicates().await?;
    Ok((StatusCode::OK, Json(groups)))
}

// POST /api/customers/merge
#[utoipa::path(
    post,
    path = "/api/customers/merge",
    tag = "Customers",
    request_body = MergePayload,
    responses(
        (status = 200, description = "Duplicates folded into the primary", body = MergeOutcome),
        (status = 404, description = "Primary customer not found")
    )
)]
pub async fn merge_customers(
    State(app_state): State<AppState>,
    Json(payload): Json<MergePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let outcome = app_state
        .customer_service
        .merge(payload.primary_id, &payload.duplicate_ids)
        .await?;

    Ok((StatusCode::OK, Json(outcome)))
}
