//! # Orchestration Types
//!
//! Stage model and result records produced by the orchestration pipeline.

use super::retry_policy::RetryPolicyDecision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered phases of an orchestrated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationStage {
    Validate,
    CheckPreconditions,
    Execute,
    VerifyPostCommit,
    Completed,
    Failed,
}

impl OrchestrationStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for OrchestrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::CheckPreconditions => write!(f, "check_preconditions"),
            Self::Execute => write!(f, "execute"),
            Self::VerifyPostCommit => write!(f, "verify_post_commit"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Which stage denied the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    ValidationFailure,
    PreconditionFailure,
    ExecutionFailure,
    PostCommitFailure,
}

impl FailureCategory {
    /// Failure category owned by a working stage
    pub fn for_stage(stage: OrchestrationStage) -> Option<Self> {
        match stage {
            OrchestrationStage::Validate => Some(Self::ValidationFailure),
            OrchestrationStage::CheckPreconditions => Some(Self::PreconditionFailure),
            OrchestrationStage::Execute => Some(Self::ExecutionFailure),
            OrchestrationStage::VerifyPostCommit => Some(Self::PostCommitFailure),
            OrchestrationStage::Completed | OrchestrationStage::Failed => None,
        }
    }
}

/// One attempted stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMarker {
    pub stage: OrchestrationStage,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Denormalized audit record, safe to forward to logging and compliance sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub operation_type: String,
    pub correlation_id: String,
    pub idempotency_key: Option<String>,
    pub user_id: Option<String>,
    pub initiated_at: DateTime<Utc>,
    /// Last stage the operation reached; `None` if it was cancelled before any stage ran
    pub stage_reached: Option<OrchestrationStage>,
    pub success: bool,
    pub failure_code: Option<String>,
    pub failure_category: Option<FailureCategory>,
    pub retry_decision: Option<RetryPolicyDecision>,
    pub duration_ms: u64,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult<T> {
    pub success: bool,
    /// Present only on success
    pub payload: Option<T>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub remediation_hint: Option<String>,
    pub failure_category: Option<FailureCategory>,
    pub completed_at_stage: OrchestrationStage,
    pub correlation_id: String,
    pub idempotency_key: Option<String>,
    pub total_duration_ms: u64,
    pub stage_markers: Vec<StageMarker>,
    pub audit_summary: AuditSummary,
}

impl<T> OrchestrationResult<T> {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    /// Stages in the order they were attempted
    pub fn attempted_stages(&self) -> Vec<OrchestrationStage> {
        self.stage_markers.iter().map(|marker| marker.stage).collect()
    }
}
