//! # Orchestration Errors
//!
//! Failures an executor may return, and the fixed table that maps them onto
//! the stable error-code taxonomy.

use super::retry_policy::RetryPolicyClassifier;
use crate::constants::error_codes;
use std::any::Any;
use std::io;
use thiserror::Error;

/// Failure returned by an executor future
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The operation exceeded its time budget
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Connectivity failure talking to a node or service
    #[error("Network failure: {0}")]
    Network(String),

    /// The target is in a state that does not allow the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Cooperative cancellation was observed
    #[error("Operation cancelled")]
    Cancelled,

    /// Executor already knows the taxonomy code for its failure
    #[error("Service failure [{code}]: {message}")]
    Coded { code: String, message: String },

    /// The executor panicked; caught by the pipeline
    #[error("Executor panicked: {0}")]
    Panicked(String),

    /// Anything else
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecutionError {
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::Timeout(detail.into())
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network(detail.into())
    }

    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::InvalidState(detail.into())
    }

    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Coded {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Taxonomy code for this failure.
    ///
    /// `Coded` failures keep their code only when the classifier recognizes it;
    /// anything unrecognized collapses to `INTERNAL_SERVER_ERROR`.
    pub fn error_code(&self) -> &str {
        match self {
            Self::Timeout(_) => error_codes::BLOCKCHAIN_TIMEOUT,
            Self::Network(_) => error_codes::NETWORK_ERROR,
            Self::InvalidState(_) => error_codes::OPERATION_FAILED,
            Self::Cancelled => error_codes::OPERATION_CANCELLED,
            Self::Coded { code, .. } if RetryPolicyClassifier::policy_for_code(code).is_some() => {
                code.as_str()
            }
            Self::Coded { .. } | Self::Panicked(_) | Self::Other(_) => {
                error_codes::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Build from a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

impl From<tokio::time::error::Elapsed> for ExecutionError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::Timeout(error.to_string())
    }
}

impl From<io::Error> for ExecutionError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut => Self::Timeout(error.to_string()),
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::AddrNotAvailable => Self::Network(error.to_string()),
            _ => Self::Other(error.into()),
        }
    }
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
