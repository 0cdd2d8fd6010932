use super::states::DeploymentStatus;
use serde::{Deserialize, Serialize};

/// Events that drive deployment status changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DeploymentEvent {
    /// Transaction handed to the network
    Submit,
    /// Transaction observed in the mempool
    MarkPending,
    /// Transaction included and confirmed
    Confirm,
    /// Indexer has picked up the deployed asset
    Index,
    /// Deployment finished
    Complete,
    /// Deployment failed with an error code
    Fail(String),
    /// Deployment cancelled by the user or an operator
    Cancel,
    /// Failed deployment re-queued for another attempt
    Retry,
}

impl DeploymentEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::MarkPending => "mark_pending",
            Self::Confirm => "confirm",
            Self::Index => "index",
            Self::Complete => "complete",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
        }
    }

    /// Status this event moves a deployment to
    pub fn target_status(&self) -> DeploymentStatus {
        match self {
            Self::Submit => DeploymentStatus::Submitted,
            Self::MarkPending => DeploymentStatus::Pending,
            Self::Confirm => DeploymentStatus::Confirmed,
            Self::Index => DeploymentStatus::Indexed,
            Self::Complete => DeploymentStatus::Completed,
            Self::Fail(_) => DeploymentStatus::Failed,
            Self::Cancel => DeploymentStatus::Cancelled,
            Self::Retry => DeploymentStatus::Queued,
        }
    }

    /// Extract error code if this is a failure event
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Fail(code) => Some(code),
            _ => None,
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        self.target_status().is_terminal()
    }
}
