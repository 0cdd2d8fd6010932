//! # Deployment Transition Guard
//!
//! Pure decision function over the deployment lifecycle. The guard never mutates
//! anything; the deployment service must consult it before every status write and
//! honor the decision.
//!
//! ```text
//! Queued ──▶ Submitted ──▶ Pending ──▶ Confirmed ──▶ Indexed ──▶ Completed
//!   │            │            │            │  └───────────────────▲
//!   └────────────┴────────────┴──▶ Failed ◀┘            (Indexed ─┘)
//!   └─ Cancelled (from Queued, Submitted, Pending)
//! Failed ──▶ Queued  (explicit retry path)
//! ```

use super::states::DeploymentStatus;
use serde::Serialize;

/// Same-state update, accepted so status re-delivery is harmless
pub const IDEMPOTENT_UPDATE: &str = "IDEMPOTENT_UPDATE";
/// Attempt to leave `Completed` or `Cancelled`
pub const TERMINAL_STATE_VIOLATION: &str = "TERMINAL_STATE_VIOLATION";
/// Target is not in the adjacency row of the source
pub const INVALID_TRANSITION: &str = "INVALID_TRANSITION";
/// Target is in the adjacency row of the source
pub const VALID_TRANSITION: &str = "VALID_TRANSITION";

/// Outcome of a transition check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionResult {
    pub is_allowed: bool,
    pub reason_code: &'static str,
}

impl TransitionResult {
    fn allowed(reason_code: &'static str) -> Self {
        Self {
            is_allowed: true,
            reason_code,
        }
    }

    fn denied(reason_code: &'static str) -> Self {
        Self {
            is_allowed: false,
            reason_code,
        }
    }
}

/// Guard enforcing the deployment lifecycle adjacency table
#[derive(Debug, Clone, Copy, Default)]
pub struct StateTransitionGuard;

impl StateTransitionGuard {
    /// Decide whether `from -> to` may be persisted
    pub fn validate_transition(from: DeploymentStatus, to: DeploymentStatus) -> TransitionResult {
        if from == to {
            return TransitionResult::allowed(IDEMPOTENT_UPDATE);
        }

        if Self::is_terminal_state(from) {
            return TransitionResult::denied(TERMINAL_STATE_VIOLATION);
        }

        if Self::valid_next_states(from).contains(&to) {
            TransitionResult::allowed(VALID_TRANSITION)
        } else {
            TransitionResult::denied(INVALID_TRANSITION)
        }
    }

    pub fn is_terminal_state(status: DeploymentStatus) -> bool {
        status.is_terminal()
    }

    /// Adjacency row for `status`; empty for terminal states
    pub fn valid_next_states(status: DeploymentStatus) -> &'static [DeploymentStatus] {
        use DeploymentStatus::*;

        match status {
            Queued => &[Submitted, Failed, Cancelled],
            Submitted => &[Pending, Failed, Cancelled],
            Pending => &[Confirmed, Failed, Cancelled],
            Confirmed => &[Completed, Indexed, Failed],
            Indexed => &[Completed, Failed],
            Failed => &[Queued],
            Completed | Cancelled => &[],
        }
    }

    /// Get a description of this guard for logging
    pub fn description(&self) -> &'static str {
        "Deployment status changes must follow the lifecycle adjacency table"
    }
}
