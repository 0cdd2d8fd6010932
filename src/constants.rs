//! # System Constants
//!
//! Error code taxonomy, status groupings and system-wide defaults that define the
//! operational boundaries of the issuance orchestration core.
//!
//! The error codes are a cross-cutting contract shared with the HTTP layer and the
//! deployment services. The retry classifier and the pipeline are both defined
//! against these exact strings, so they must stay stable.

// Re-export the lifecycle status for convenience
pub use crate::state_machine::DeploymentStatus;

/// Stable string error codes emitted by the pipeline and consumed by the classifier
pub mod error_codes {
    // Validation / request shape
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const MISSING_REQUIRED_FIELD: &str = "MISSING_REQUIRED_FIELD";
    pub const INVALID_NETWORK: &str = "INVALID_NETWORK";
    pub const INVALID_TOKEN_PARAMETERS: &str = "INVALID_TOKEN_PARAMETERS";
    pub const METADATA_VALIDATION_FAILED: &str = "METADATA_VALIDATION_FAILED";
    pub const INVALID_TOKEN_STANDARD: &str = "INVALID_TOKEN_STANDARD";

    // Authentication / authorization
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const INVALID_AUTH_TOKEN: &str = "INVALID_AUTH_TOKEN";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";

    // Conflicts
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const USER_ALREADY_EXISTS: &str = "USER_ALREADY_EXISTS";
    pub const CONFLICT: &str = "CONFLICT";
    pub const IDEMPOTENCY_KEY_MISMATCH: &str = "IDEMPOTENCY_KEY_MISMATCH";
    pub const INVALID_STATE_TRANSITION: &str = "INVALID_STATE_TRANSITION";

    // Transient infrastructure
    pub const BLOCKCHAIN_CONNECTION_ERROR: &str = "BLOCKCHAIN_CONNECTION_ERROR";
    pub const IPFS_SERVICE_ERROR: &str = "IPFS_SERVICE_ERROR";
    pub const EXTERNAL_SERVICE_ERROR: &str = "EXTERNAL_SERVICE_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const BLOCKCHAIN_TIMEOUT: &str = "BLOCKCHAIN_TIMEOUT";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

    // Load shedding
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const CIRCUIT_BREAKER_OPEN: &str = "CIRCUIT_BREAKER_OPEN";
    pub const SUBSCRIPTION_LIMIT_REACHED: &str = "SUBSCRIPTION_LIMIT_REACHED";

    // Remediation gated
    pub const KYC_NOT_VERIFIED: &str = "KYC_NOT_VERIFIED";
    pub const KYC_REQUIRED: &str = "KYC_REQUIRED";
    pub const SUBSCRIPTION_REQUIRED: &str = "SUBSCRIPTION_REQUIRED";
    pub const PRECONDITION_FAILED: &str = "PRECONDITION_FAILED";

    // Pipeline outcomes
    pub const OPERATION_FAILED: &str = "OPERATION_FAILED";
    pub const OPERATION_CANCELLED: &str = "OPERATION_CANCELLED";
    pub const POST_COMMIT_VERIFICATION_FAILED: &str = "POST_COMMIT_VERIFICATION_FAILED";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";

    /// Caller-facing message for a code. Messages are fixed per code so that no
    /// executor internals leak across the core boundary.
    pub fn user_message(code: &str) -> &'static str {
        match code {
            INVALID_REQUEST => "The request failed validation",
            PRECONDITION_FAILED => "A business precondition for this operation is not satisfied",
            BLOCKCHAIN_TIMEOUT => "The blockchain did not respond before the operation timed out",
            TIMEOUT => "The operation timed out",
            NETWORK_ERROR => "A network error prevented the operation from completing",
            BLOCKCHAIN_CONNECTION_ERROR => "Could not connect to the blockchain node",
            IPFS_SERVICE_ERROR => "The metadata storage service is unavailable",
            EXTERNAL_SERVICE_ERROR => "An external service failed to respond correctly",
            OPERATION_FAILED => "The operation could not be completed in the current state",
            OPERATION_CANCELLED => "The operation was cancelled before it completed",
            POST_COMMIT_VERIFICATION_FAILED => {
                "The operation was applied but its result could not be verified"
            }
            IDEMPOTENCY_KEY_MISMATCH => {
                "The idempotency key was already used with a different request body"
            }
            INVALID_STATE_TRANSITION => "The requested status change is not permitted",
            RATE_LIMIT_EXCEEDED => "Too many requests; the rate limit was exceeded",
            CIRCUIT_BREAKER_OPEN => "The downstream service is temporarily unavailable",
            SUBSCRIPTION_LIMIT_REACHED => "The subscription usage limit has been reached",
            _ => "The operation failed",
        }
    }

    /// Remediation hint for a code, if the caller can do something about it.
    pub fn remediation_hint(code: &str) -> Option<&'static str> {
        let hint = match code {
            INVALID_REQUEST | MISSING_REQUIRED_FIELD | INVALID_TOKEN_PARAMETERS
            | METADATA_VALIDATION_FAILED | INVALID_TOKEN_STANDARD | INVALID_NETWORK => {
                "Correct the request fields and submit again"
            }
            PRECONDITION_FAILED => "Resolve the failed precondition, then retry the operation",
            KYC_NOT_VERIFIED | KYC_REQUIRED => "Complete identity verification, then retry",
            SUBSCRIPTION_REQUIRED => "Activate a subscription plan, then retry",
            SUBSCRIPTION_LIMIT_REACHED => "Upgrade the subscription or wait for the usage period to reset",
            BLOCKCHAIN_TIMEOUT | TIMEOUT => {
                "Check the deployment status before retrying; the transaction may still confirm"
            }
            NETWORK_ERROR | BLOCKCHAIN_CONNECTION_ERROR | IPFS_SERVICE_ERROR
            | EXTERNAL_SERVICE_ERROR => "Retry after a short delay",
            RATE_LIMIT_EXCEEDED | CIRCUIT_BREAKER_OPEN => "Wait for the cooldown period before retrying",
            OPERATION_CANCELLED => "Resubmit the operation if it is still required",
            POST_COMMIT_VERIFICATION_FAILED => {
                "Reconcile the deployment record before retrying; side effects were applied"
            }
            IDEMPOTENCY_KEY_MISMATCH => "Use a new idempotency key for a different request",
            UNAUTHORIZED | INVALID_AUTH_TOKEN => "Authenticate again and retry",
            _ => return None,
        };
        Some(hint)
    }
}

/// Status groupings for validation and logic
pub mod status_groups {
    use super::DeploymentStatus;

    /// Deployment statuses from which no further change is possible
    pub const DEPLOYMENT_FINAL_STATES: &[DeploymentStatus] =
        &[DeploymentStatus::Completed, DeploymentStatus::Cancelled];

    /// Deployment statuses in which on-chain work is in flight
    pub const DEPLOYMENT_IN_FLIGHT_STATES: &[DeploymentStatus] = &[
        DeploymentStatus::Submitted,
        DeploymentStatus::Pending,
        DeploymentStatus::Confirmed,
        DeploymentStatus::Indexed,
    ];
}

/// System-wide constants
pub mod system {
    /// Operation type substituted when a caller supplies none
    pub const UNSPECIFIED_OPERATION: &str = "unspecified_operation";

    /// Retry attempt ceiling shared by every retryable policy
    pub const MAX_RETRY_ATTEMPTS: u32 = 10;

    /// Window after the first attempt during which retries are allowed
    pub const RETRY_WINDOW_SECONDS: u64 = 24 * 60 * 60;

    /// Default lifetime of an idempotency record
    pub const IDEMPOTENCY_EXPIRATION_SECONDS: u64 = 15 * 60;

    /// Default interval between idempotency store sweeps
    pub const IDEMPOTENCY_PURGE_INTERVAL_SECONDS: u64 = 60;

    /// Upper bound for any configured duration (365 days)
    pub const MAX_CONFIGURED_SECONDS: u64 = 365 * 24 * 60 * 60;
}
