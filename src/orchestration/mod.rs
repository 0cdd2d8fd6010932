//! # Orchestration Core
//!
//! Stage-driven execution of token-issuance operations.
//!
//! ## Core Components
//!
//! - **OrchestrationPipeline**: runs validate, precondition, execute and post-commit
//!   stages and produces an [`OrchestrationResult`] with an audit summary
//! - **RetryPolicyClassifier**: maps error codes to retry policies and backoff schedules
//! - **OrchestrationContext**: immutable identity of one call (correlation id,
//!   idempotency key, user)
//! - **CancellationToken**: `tokio_util` token observed at the executor boundary
//! - **ExecutionError**: executor failures and their fixed error-code mapping

pub mod context;
pub mod errors;
pub mod pipeline;
pub mod retry_policy;
pub mod types;

pub use context::{OrchestrationContext, OrchestrationContextBuilder};
pub use errors::{ExecutionError, ExecutionResult};
pub use pipeline::{post_commit_verifier, OrchestrationPipeline, PostCommitVerifier};
pub use retry_policy::{
    ErrorCategory, RetryPolicy, RetryPolicyClassifier, RetryPolicyDecision,
    RETRY_AFTER_CONTEXT_KEY,
};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    AuditSummary, FailureCategory, OrchestrationResult, OrchestrationStage, StageMarker,
};
