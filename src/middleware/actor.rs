// src/middleware/actor.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// Cabeçalho opcional com o usuário que age (só para a trilha de auditoria)
const USER_ID_HEADER: &str = "x-user-id";

/// Quem está agindo, quando o cliente informa. A autenticação fica fora deste serviço.
#[derive(Debug, Clone, Copy, Default)]
pub struct Actor(pub Option<Uuid>);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_ID_HEADER) else {
            return Ok(Actor(None));
        };

        let value_str = value.to_str().map_err(|_| {
            AppError::BadRequest("Header x-user-id contains invalid characters.".to_string())
        })?;

        let user_id = Uuid::parse_str(value_str.trim()).map_err(|_| {
            AppError::BadRequest("Header x-user-id is not a valid UUID.".to_string())
        })?;

        Ok(Actor(Some(user_id)))
    }
}
