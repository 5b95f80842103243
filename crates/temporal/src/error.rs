use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemporalError {
    #[error("episode not found")]
    EpisodeNotFound,

    #[error("episode already closed")]
    AlreadyClosed,

    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Memory(#[from] zoe_memory::MemoryError),
}

impl From<TemporalError> for zoe_core::CoreError {
    fn from(err: TemporalError) -> Self {
        match err {
            TemporalError::EpisodeNotFound => zoe_core::CoreError::Validation(err.to_string()),
            TemporalError::AlreadyClosed => zoe_core::CoreError::Conflict(err.to_string()),
            TemporalError::Summarization(_) => zoe_core::CoreError::Transient(err.to_string()),
            TemporalError::Storage(_) => zoe_core::CoreError::Fatal(err.to_string()),
            TemporalError::Memory(e) => e.into(),
        }
    }
}
