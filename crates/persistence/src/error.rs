//! Persistence-layer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("schema error: {0}")]
    SchemaError(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<scylla::transport::errors::NewSessionError> for PersistenceError {
    fn from(err: scylla::transport::errors::NewSessionError) -> Self {
        PersistenceError::Connection(err.to_string())
    }
}

impl From<scylla::transport::errors::QueryError> for PersistenceError {
    fn from(err: scylla::transport::errors::QueryError) -> Self {
        PersistenceError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::InvalidData(err.to_string())
    }
}

impl From<PersistenceError> for zoe_core::CoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(msg) => zoe_core::CoreError::Conflict(msg),
            other => zoe_core::CoreError::Fatal(other.to_string()),
        }
    }
}
