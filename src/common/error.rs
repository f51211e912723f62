// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::contract::ContractStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("malformed CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("contract {0} not found")]
    ContractNotFound(i64),

    #[error("customer {0} not found")]
    CustomerNotFound(i64),

    #[error("import run {0} not found")]
    ImportRunNotFound(i64),

    // A mensagem precisa nomear o par (de, para) ilegal
    #[error("invalid status transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: ContractStatus,
        to: ContractStatus,
    },

    // Outro escritor alterou o contrato entre a leitura e a escrita
    #[error("contract {0} was modified concurrently")]
    StaleState(i64),

    #[error("contract {id} is {status} and does not accept visits")]
    ContractNotLive { id: i64, status: ContractStatus },

    #[error("{0}")]
    UniqueConstraintViolation(String),

    #[error("database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("internal server error")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Falhas que tornam inútil continuar um lote (banco fora do ar, pool esgotado).
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseError(
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            )
        )
    }

    /// Converte violação de chave única em erro amigável, preservando o resto.
    pub fn from_insert(e: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::UniqueConstraintViolation(what());
            }
        }
        e.into()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more fields are invalid.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ref e @ AppError::CsvError(_) => (StatusCode::BAD_REQUEST, e.to_string()),
            ref e @ (AppError::ContractNotFound(_)
            | AppError::CustomerNotFound(_)
            | AppError::ImportRunNotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            ref e @ AppError::InvalidTransition { .. } => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ref e @ AppError::ContractNotLive { .. } => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ref e @ AppError::StaleState(_) => (StatusCode::CONFLICT, e.to_string()),
            AppError::UniqueConstraintViolation(msg) => (StatusCode::CONFLICT, msg),

            // DatabaseError e InternalServerError viram 500; o detalhe fica só no log.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "An unexpected error occurred.".to_string())
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
