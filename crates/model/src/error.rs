use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Semantic error taxonomy shared by every service layer.
///
/// Each layer attaches the operation name and the primary key it was working
/// on; no layer swallows an error on the way up.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("oracle failed during {operation}: {message}")]
    Oracle {
        operation: &'static str,
        message: String,
    },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("operation canceled")]
    Canceled,

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl Error {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}
