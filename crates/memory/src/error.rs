use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<MemoryError> for zoe_core::CoreError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Validation(_) => zoe_core::CoreError::Validation(err.to_string()),
            MemoryError::Embedding(_) | MemoryError::Model(_) | MemoryError::Storage(_) => {
                zoe_core::CoreError::Fatal(err.to_string())
            }
        }
    }
}
