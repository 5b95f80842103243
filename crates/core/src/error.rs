//! Error taxonomy shared by every component crate.
//!
//! Each component crate defines its own narrow `thiserror` enum and converts
//! into [`CoreError`] at its boundary; callers that only need the taxonomy
//! (e.g. to pick an HTTP status code) match on [`ErrorKind`].

use thiserror::Error;

/// The six error kinds from the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request or unknown user.
    Validation,
    /// Unresolved session when one was required.
    Auth,
    /// Upstream timeout or 5xx from a collaborator; retryable once.
    Transient,
    /// Local deadline exceeded.
    Timeout,
    /// Idempotency or concurrency clash.
    Conflict,
    /// Data corruption, missing required collaborator, or dimension mismatch.
    Fatal,
}

/// Top-level error type for the conversation core.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::Validation,
            CoreError::Auth(_) => ErrorKind::Auth,
            CoreError::Transient(_) => ErrorKind::Transient,
            CoreError::Timeout(_) => ErrorKind::Timeout,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(CoreError::Timeout("x".into()).kind(), ErrorKind::Timeout);
        assert_eq!(CoreError::Conflict("x".into()).kind(), ErrorKind::Conflict);
    }
}
