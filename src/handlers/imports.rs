// src/handlers/imports.rs

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::actor::Actor,
    models::import::{ImportOptions, ImportReport, ImportRun, RawRow, RowConflicts, UndoSummary},
    services::import_service::{parse_csv, template_csv},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    #[validate(length(min = 1, message = "At least one row is required."))]
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<RawRow>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub skip_invalid: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConflictsPayload {
    #[validate(length(min = 1, message = "At least one row is required."))]
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UndoPayload {
    pub import_run_id: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UndoResponse {
    pub ok: bool,
    pub summary: UndoSummary,
}

// POST /api/import
#[utoipa::path(
    post,
    path = "/api/import",
    tag = "Import",
    request_body = ImportPayload,
    params(("x-user-id" = Option<String>, Header, description = "Acting user (uuid)")),
    responses(
        (status = 200, description = "Per-row results and run counters", body = ImportReport),
        (status = 400, description = "Empty batch")
    )
)]
pub async fn import_rows(
    State(app_state): State<AppState>,
    Actor(actor): Actor,
    Json(payload): Json<ImportPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let options = ImportOptions {
        dry_run: payload.dry_run,
        skip_invalid: payload.skip_invalid,
    };
    let report = app_state
        .import_service
        .import_batch(&payload.rows, options, actor)
        .await?;

    Ok((StatusCode::OK, Json(report)))
}

// POST /api/import/csv
#[utoipa::path(
    post,
    path = "/api/import/csv",
    tag = "Import",
    request_body(content = String, content_type = "text/csv", description = "Spreadsheet with a header row"),
    params(
        ("dryRun" = Option<bool>, Query, description = "Validate and count without writing"),
        ("skipInvalid" = Option<bool>, Query, description = "Skip rows with invalid coordinates"),
        ("x-user-id" = Option<String>, Header, description = "Acting user (uuid)")
    ),
    responses(
        (status = 200, description = "Per-row results and run counters", body = ImportReport),
        (status = 400, description = "Malformed or empty CSV")
    )
)]
pub async fn import_csv(
    State(app_state): State<AppState>,
    Actor(actor): Actor,
    Query(options): Query<ImportOptions>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let rows = parse_csv(&body)?;
    if rows.is_empty() {
        return Err(AppError::BadRequest("CSV has no data rows.".to_string()));
    }

    let report = app_state
        .import_service
        .import_batch(&rows, options, actor)
        .await?;

    Ok((StatusCode::OK, Json(report)))
}

// GET /api/import/template
#[utoipa::path(
    get,
    path = "/api/import/template",
    tag = "Import",
    responses(
        (status = 200, description = "CSV header row to fill in", content_type = "text/csv", body = String)
    )
)]
pub async fn download_template() -> Result<impl IntoResponse, AppError> {
    let csv = template_csv()?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"amc_import_template.csv\"",
            ),
        ],
        csv,
    ))
}

// POST /api/import/conflicts
#[utoipa::path(
    post,
    path = "/api/import/conflicts",
    tag = "Import",
    request_body = ConflictsPayload,
    responses(
        (status = 200, description = "Rows whose license/GRA belongs to another name", body = Vec<RowConflicts>)
    )
)]
pub async fn preview_conflicts(
    State(app_state): State<AppState>,
    Json(payload): Json<ConflictsPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let conflicts = app_state
        .import_service
        .preview_conflicts(&payload.rows)
        .await?;

    Ok((StatusCode::OK, Json(conflicts)))
}

// GET /api/import/runs
#[utoipa::path(
    get,
    path = "/api/import/runs",
    tag = "Import",
    responses(
        (status = 200, description = "Most recent import runs", body = Vec<ImportRun>)
    )
)]
pub async fn list_runs(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let runs = app_state.import_service.list_runs().await?;
    Ok((StatusCode::OK, Json(runs)))
}

// POST /api/import/undo
#[utoipa::path(
    post,
    path = "/api/import/undo",
    tag = "Import",
    request_body = UndoPayload,
    responses(
        (status = 200, description = "Run undone", body = UndoResponse),
        (status = 404, description = "Import run not found")
    )
)]
pub async fn undo_import(
    State(app_state): State<AppState>,
    Json(payload): Json<UndoPayload>,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.import_service.undo(payload.import_run_id).await?;
    Ok((StatusCode::OK, Json(UndoResponse { ok: true, summary })))
}
