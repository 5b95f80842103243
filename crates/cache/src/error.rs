use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("compute failed: {0}")]
    Compute(String),

    #[error("summarization failed: {0}")]
    Summarization(String),
}

impl From<CacheError> for zoe_core::CoreError {
    fn from(err: CacheError) -> Self {
        zoe_core::CoreError::Transient(err.to_string())
    }
}
