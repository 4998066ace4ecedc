//! Error types for the conversational core.

use compass_core::error::CompassError;

/// Request-level errors. Classification, scoring and composition never
/// produce these; only validation and session storage do.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("assistant is disabled")]
    Disabled,
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("query exceeds maximum length of {0} characters")]
    QueryTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<CompassError> for ChatError {
    fn from(err: CompassError) -> Self {
        ChatError::StorageError(err.to_string())
    }
}

/// Failure reported by an external collaborator (NLU, follow-up analysis,
/// vector search). Always recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator failed: {0}")]
    Failed(String),
    #[error("collaborator unavailable")]
    Unavailable,
}
