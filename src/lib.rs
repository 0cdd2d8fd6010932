#![allow(clippy::doc_markdown)] // Allow technical terms like IPFS, KYC in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Issuance Core
//!
//! Workflow orchestration core for a token-issuance platform.
//!
//! ## Overview
//!
//! Authenticated users trigger multi-step blockchain deployment jobs: create an
//! asset, submit a transaction, wait for confirmation, index it. This crate makes
//! those jobs behave deterministically, survive partial failure and leave an
//! auditable trail. It does not talk to chains, IPFS or billing itself; those are
//! executors the caller plugs in.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Stage pipeline, retry policy classifier, cancellation
//! - [`state_machine`] - Deployment lifecycle guard and state machine
//! - [`idempotency`] - Idempotency key guard and record store
//! - [`config`] - Layered configuration
//! - [`constants`] - Error code taxonomy and system defaults
//! - [`error`] - Crate-level error type
//! - [`logging`] - Structured logging setup and audit emission
//!
//! ## Quick Start
//!
//! ```rust
//! use issuance_core::{ExecutionError, OrchestrationPipeline, StateTransitionGuard, DeploymentStatus};
//!
//! # tokio_test::block_on(async {
//! let pipeline = OrchestrationPipeline::default();
//! let context = pipeline.build_context("deploy_token", None, None, Some("user-1"));
//!
//! let result = pipeline
//!     .execute(
//!         &context,
//!         "ACME".to_string(),
//!         |symbol: &String| symbol.is_empty().then(|| "Token symbol is required".to_string()),
//!         |_symbol: &String| Some("KYC_NOT_VERIFIED".to_string()),
//!         |_symbol: String| async { Ok::<_, ExecutionError>("0xabc".to_string()) },
//!         None,
//!         None,
//!     )
//!     .await;
//! assert_eq!(result.error_code.as_deref(), Some("PRECONDITION_FAILED"));
//!
//! let step = StateTransitionGuard::validate_transition(DeploymentStatus::Queued, DeploymentStatus::Submitted);
//! assert!(step.is_allowed);
//! # });
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod idempotency;
pub mod logging;
pub mod orchestration;
pub mod state_machine;

pub use config::{ConfigManager, ConfigurationError, IssuanceConfig};
pub use constants::{error_codes, status_groups, system};
pub use error::{CoreError, CoreResult};
pub use idempotency::{
    IdempotencyError, IdempotencyGuard, IdempotencyOutcome, IdempotencyStore,
    IdempotentResponse, InMemoryIdempotencyStore,
};
pub use orchestration::{
    CancellationToken, ExecutionError, FailureCategory, OrchestrationContext,
    OrchestrationPipeline, OrchestrationResult, OrchestrationStage, RetryPolicy,
    RetryPolicyClassifier, RetryPolicyDecision,
};
pub use state_machine::{
    DeploymentEvent, DeploymentStateMachine, DeploymentStatus, DeploymentStore,
    InMemoryDeploymentStore, StateTransitionGuard, TransitionResult,
};
