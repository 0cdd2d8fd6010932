//! Error types for the issuance orchestration core.
//!

use crate::config::ConfigurationError;
use crate::constants::error_codes;
use crate::idempotency::IdempotencyError;
use crate::state_machine::errors::{PersistenceError, StateMachineError};
use thiserror::Error;

/// Crate-level error. Module errors convert into it so callers that glue several
/// components together can use a single `?` chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Persistence error: {0}")]
    PersistenceError(String),
    #[error("Idempotency error: {0}")]
    IdempotencyError(#[from] IdempotencyError),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(error: serde_json::Error) -> Self {
        CoreError::SerializationError(format!("JSON serialization error: {error}"))
    }
}

impl From<ConfigurationError> for CoreError {
    fn from(error: ConfigurationError) -> Self {
        CoreError::ConfigurationError(error.to_string())
    }
}

impl From<StateMachineError> for CoreError {
    fn from(error: StateMachineError) -> Self {
        CoreError::StateTransitionError(error.to_string())
    }
}

impl From<PersistenceError> for CoreError {
    fn from(error: PersistenceError) -> Self {
        CoreError::PersistenceError(error.to_string())
    }
}

impl CoreError {
    /// Stable error code from the taxonomy in [`error_codes`]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::IdempotencyError(error) => error.error_code(),
            Self::StateTransitionError(_) => error_codes::INVALID_STATE_TRANSITION,
            Self::ValidationError(_) => error_codes::INVALID_REQUEST,
            Self::ConfigurationError(_)
            | Self::PersistenceError(_)
            | Self::SerializationError(_)
            | Self::Internal(_) => error_codes::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        let err = CoreError::ValidationError("bad input".to_string());
        assert_eq!(err.to_string(), "Validation error: bad input");

        let err = CoreError::Internal("boom".to_string());
        assert_eq!(err.to_string(), "Internal error: boom");
    }

    #[test]
    fn test_idempotency_error_keeps_its_code() {
        let err: CoreError = IdempotencyError::KeyMismatch {
            key: "k-1".to_string(),
        }
        .into();

        assert_eq!(err.error_code(), "IDEMPOTENCY_KEY_MISMATCH");
        assert_eq!(
            err,
            CoreError::IdempotencyError(IdempotencyError::KeyMismatch {
                key: "k-1".to_string()
            })
        );
        assert!(err.to_string().starts_with("Idempotency error: "));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CoreError = json_err.into();
        assert!(matches!(err, CoreError::SerializationError(_)));
    }
}
