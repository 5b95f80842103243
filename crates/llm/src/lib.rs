//! Inference backend client.
//!
//! Wraps the single external collaborator spec §6 calls "the inference
//! backend": a local HTTP endpoint accepting `{ model, prompt | messages,
//! stream, options }`. The orchestrator and context cache summarizer both
//! depend on this crate rather than talking HTTP directly.

pub mod backend;
pub mod prompt;

pub use backend::{FinishReason, GenerationResult, HttpInferenceBackend, InferenceBackend, LlmConfig};
pub use prompt::{extract_json, Message, Role};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("generation error: {0}")]
    Generation(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("timeout")]
    Timeout,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for zoe_core::CoreError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => zoe_core::CoreError::Timeout(err.to_string()),
            LlmError::Configuration(_) => zoe_core::CoreError::Fatal(err.to_string()),
            _ => zoe_core::CoreError::Transient(err.to_string()),
        }
    }
}
