use thiserror::Error;

#[derive(Debug, Error)]
pub enum SatisfactionError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<SatisfactionError> for zoe_core::CoreError {
    fn from(err: SatisfactionError) -> Self {
        match err {
            SatisfactionError::Validation(_) => zoe_core::CoreError::Validation(err.to_string()),
            SatisfactionError::Storage(_) => zoe_core::CoreError::Fatal(err.to_string()),
        }
    }
}
