//! Idempotency guard errors.

use crate::constants::error_codes;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdempotencyError {
    /// The key already guards a request with a different body
    #[error("Idempotency key '{key}' was already used with a different request")]
    KeyMismatch { key: String },

    /// A request or response could not be converted to or from JSON
    #[error("Failed to serialize {subject}: {reason}")]
    Serialization {
        subject: &'static str,
        reason: String,
    },

    /// The backing store failed
    #[error("Idempotency store failure: {0}")]
    Store(String),
}

impl IdempotencyError {
    pub fn serialization(subject: &'static str, error: impl ToString) -> Self {
        Self::Serialization {
            subject,
            reason: error.to_string(),
        }
    }

    /// Taxonomy code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::KeyMismatch { .. } => error_codes::IDEMPOTENCY_KEY_MISMATCH,
            Self::Serialization { .. } | Self::Store(_) => error_codes::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type IdempotencyResult<T> = Result<T, IdempotencyError>;
