use super::states::DeploymentStatus;
use thiserror::Error;

/// Error types for deployment state machine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateMachineError {
    #[error("Transition {from} -> {to} denied for deployment {deployment_id}: {reason_code}")]
    TransitionDenied {
        deployment_id: String,
        from: DeploymentStatus,
        to: DeploymentStatus,
        reason_code: &'static str,
    },

    #[error("Event {event} is not valid in state {from}")]
    InvalidEvent {
        from: DeploymentStatus,
        event: &'static str,
    },

    #[error("Persistence operation failed: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Error type for the deployment persistence boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    #[error("Deployment {deployment_id} not found")]
    NotFound { deployment_id: String },

    #[error("Deployment {deployment_id} already exists")]
    AlreadyExists { deployment_id: String },

    #[error(
        "Concurrent modification detected for deployment {deployment_id}: expected {expected}, found {actual}"
    )]
    ConcurrentModification {
        deployment_id: String,
        expected: DeploymentStatus,
        actual: DeploymentStatus,
    },

    #[error("History for deployment {deployment_id} has no room for another transition")]
    HistoryFull { deployment_id: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
