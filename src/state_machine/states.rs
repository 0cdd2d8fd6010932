use crate::constants::status_groups;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment lifecycle states for a token deployment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Deployment request accepted and waiting to be submitted
    Queued,
    /// Transaction has been submitted to the network
    Submitted,
    /// Transaction is in the mempool awaiting inclusion
    Pending,
    /// Transaction has been confirmed on-chain
    Confirmed,
    /// Deployed asset has been picked up by the indexer
    Indexed,
    /// Deployment finished successfully
    Completed,
    /// Deployment failed; may be re-queued
    Failed,
    /// Deployment was cancelled
    Cancelled,
}

impl DeploymentStatus {
    /// Every status, in lifecycle order
    pub const ALL: [DeploymentStatus; 8] = [
        Self::Queued,
        Self::Submitted,
        Self::Pending,
        Self::Confirmed,
        Self::Indexed,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        status_groups::DEPLOYMENT_FINAL_STATES.contains(self)
    }

    /// Check if this is an error state that may allow recovery
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Check if on-chain work is in flight for this state
    pub fn is_in_flight(&self) -> bool {
        status_groups::DEPLOYMENT_IN_FLIGHT_STATES.contains(self)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Submitted => write!(f, "submitted"),
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Indexed => write!(f, "indexed"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "submitted" => Ok(Self::Submitted),
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "indexed" => Ok(Self::Indexed),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid deployment status: {s}")),
        }
    }
}

/// Default state for new deployments
impl Default for DeploymentStatus {
    fn default() -> Self {
        Self::Queued
    }
}
