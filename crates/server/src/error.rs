//! Server-level errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use zoe_core::ErrorKind;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Transient(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::BAD_REQUEST,
            ServerError::Auth(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Transient(_) => StatusCode::BAD_GATEWAY,
            ServerError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        err.status()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

fn kind_to_server_error(kind: ErrorKind, message: String) -> ServerError {
    match kind {
        ErrorKind::Validation => ServerError::Validation(message),
        ErrorKind::Auth => ServerError::Auth(message),
        ErrorKind::Transient => ServerError::Transient(message),
        ErrorKind::Timeout => ServerError::Timeout(message),
        ErrorKind::Conflict => ServerError::Conflict(message),
        ErrorKind::Fatal => ServerError::Internal(message),
    }
}

impl From<zoe_core::CoreError> for ServerError {
    fn from(err: zoe_core::CoreError) -> Self {
        let kind = err.kind();
        kind_to_server_error(kind, err.to_string())
    }
}

impl From<zoe_memory::MemoryError> for ServerError {
    fn from(err: zoe_memory::MemoryError) -> Self {
        ServerError::from(zoe_core::CoreError::from(err))
    }
}

impl From<zoe_temporal::TemporalError> for ServerError {
    fn from(err: zoe_temporal::TemporalError) -> Self {
        ServerError::from(zoe_core::CoreError::from(err))
    }
}

impl From<zoe_orchestrator::OrchestratorError> for ServerError {
    fn from(err: zoe_orchestrator::OrchestratorError) -> Self {
        ServerError::from(zoe_core::CoreError::from(err))
    }
}

impl From<zoe_satisfaction::SatisfactionError> for ServerError {
    fn from(err: zoe_satisfaction::SatisfactionError) -> Self {
        ServerError::from(zoe_core::CoreError::from(err))
    }
}

impl From<zoe_cache::CacheError> for ServerError {
    fn from(err: zoe_cache::CacheError) -> Self {
        ServerError::from(zoe_core::CoreError::from(err))
    }
}
