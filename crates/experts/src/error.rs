use thiserror::Error;
use zoe_core::ErrorKind;

#[derive(Debug, Error)]
pub enum ExpertError {
    #[error("expert '{0}' not registered")]
    NotRegistered(String),

    #[error("expert '{0}' timed out")]
    Timeout(String),

    #[error("expert '{0}' failed: {1}")]
    Execution(String, String),
}

impl ExpertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExpertError::NotRegistered(_) => ErrorKind::Validation,
            ExpertError::Timeout(_) => ErrorKind::Timeout,
            ExpertError::Execution(_, _) => ErrorKind::Transient,
        }
    }
}

impl From<ExpertError> for zoe_core::CoreError {
    fn from(err: ExpertError) -> Self {
        match err {
            ExpertError::NotRegistered(_) => zoe_core::CoreError::Validation(err.to_string()),
            ExpertError::Timeout(_) => zoe_core::CoreError::Timeout(err.to_string()),
            ExpertError::Execution(_, _) => zoe_core::CoreError::Transient(err.to_string()),
        }
    }
}
