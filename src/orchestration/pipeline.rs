//! # Orchestration Pipeline
//!
//! Drives one business operation through its ordered stages and turns every
//! outcome, including executor faults and cancellation, into a structured
//! [`OrchestrationResult`].
//!
//! ## Stage Sequence
//!
//! ```text
//! Validate ──▶ CheckPreconditions ──▶ Execute ──▶ VerifyPostCommit ──▶ Completed
//!    │                │                  │               │
//!    └────────────────┴──────────────────┴───────────────┴──────────▶ Failed
//! ```
//!
//! The first denied stage short-circuits to `Failed`; later stages are never
//! attempted. Every failure is classified by the [`RetryPolicyClassifier`] and
//! the decision is attached to the audit summary.
//!
//! ## Usage
//!
//! ```rust
//! use issuance_core::orchestration::{OrchestrationPipeline, ExecutionError};
//!
//! # tokio_test::block_on(async {
//! let pipeline = OrchestrationPipeline::default();
//! let context = pipeline.build_context("deploy_token", None, Some("idem-1"), Some("user-7"));
//!
//! let result = pipeline
//!     .execute(
//!         &context,
//!         "token".to_string(),
//!         |_request: &String| None,
//!         |_request: &String| None,
//!         |request: String| async move { Ok::<_, ExecutionError>(format!("{request}:ok")) },
//!         None,
//!         None,
//!     )
//!     .await;
//!
//! assert!(result.success);
//! assert_eq!(result.payload.as_deref(), Some("token:ok"));
//! # });
//! ```

use super::context::{OrchestrationContext, OrchestrationContextBuilder};
use super::errors::ExecutionError;
use super::retry_policy::RetryPolicyClassifier;
use super::types::{
    AuditSummary, FailureCategory, OrchestrationResult, OrchestrationStage, StageMarker,
};
use crate::config::{IssuanceConfig, PipelineConfig};
use crate::constants::error_codes;
use crate::logging;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Boxed async check run against the executor's result.
///
/// `Ok` carries the (possibly enriched) response forward as the payload; `Err`
/// carries a denial reason that is logged but never surfaced.
pub type PostCommitVerifier<Resp> =
    Box<dyn FnOnce(Resp) -> BoxFuture<'static, Result<Resp, String>> + Send>;

/// Box an async closure as a [`PostCommitVerifier`]
pub fn post_commit_verifier<Resp, F, Fut>(verifier: F) -> PostCommitVerifier<Resp>
where
    Resp: Send + 'static,
    F: FnOnce(Resp) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Resp, String>> + Send + 'static,
{
    Box::new(move |response| verifier(response).boxed())
}

/// Why a run ended in `Failed`
struct StageFailure {
    /// Stage that denied; `None` when cancelled before any stage ran
    stage: Option<OrchestrationStage>,
    category: FailureCategory,
    error_code: String,
    error_message: String,
    remediation_hint: Option<String>,
}

impl StageFailure {
    /// Failure whose message and hint come from the fixed per-code table
    fn from_code(
        stage: Option<OrchestrationStage>,
        category: FailureCategory,
        error_code: &str,
    ) -> Self {
        Self {
            stage,
            category,
            error_code: error_code.to_string(),
            error_message: error_codes::user_message(error_code).to_string(),
            remediation_hint: error_codes::remediation_hint(error_code).map(str::to_string),
        }
    }
}

/// Markers and timing for one in-flight run
struct StageRun<'a> {
    context: &'a OrchestrationContext,
    started: Instant,
    markers: Vec<StageMarker>,
    stage_logging: bool,
}

impl<'a> StageRun<'a> {
    fn new(context: &'a OrchestrationContext, stage_logging: bool) -> Self {
        Self {
            context,
            started: Instant::now(),
            markers: Vec::with_capacity(4),
            stage_logging,
        }
    }

    fn mark(&mut self, stage: OrchestrationStage, success: bool) {
        if self.stage_logging {
            debug!(
                correlation_id = %self.context.correlation_id(),
                stage = %stage,
                success,
                "Stage finished"
            );
        }
        self.markers.push(StageMarker {
            stage,
            success,
            timestamp: Utc::now(),
        });
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Outcome of running a synchronous policy callable
enum PolicyVerdict {
    Pass,
    Denied(String),
    Faulted(String),
}

fn evaluate_policy<Req, F>(policy: F, request: &Req) -> PolicyVerdict
where
    F: FnOnce(&Req) -> Option<String>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| policy(request))) {
        Ok(Some(denial)) if !denial.trim().is_empty() => PolicyVerdict::Denied(denial),
        Ok(_) => PolicyVerdict::Pass,
        Err(payload) => PolicyVerdict::Faulted(ExecutionError::from_panic(payload).to_string()),
    }
}

/// Composition root for orchestrated operations
#[derive(Debug, Clone)]
pub struct OrchestrationPipeline {
    config: PipelineConfig,
    classifier: RetryPolicyClassifier,
}

impl Default for OrchestrationPipeline {
    fn default() -> Self {
        Self::from_config(&IssuanceConfig::default())
    }
}

impl OrchestrationPipeline {
    pub fn new(config: PipelineConfig, classifier: RetryPolicyClassifier) -> Self {
        Self { config, classifier }
    }

    pub fn from_config(config: &IssuanceConfig) -> Self {
        Self::new(
            config.pipeline.clone(),
            RetryPolicyClassifier::with_config(config.retry.clone()),
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &RetryPolicyClassifier {
        &self.classifier
    }

    /// Create the immutable context for one call. Never fails: a blank
    /// operation type becomes the configured default and a missing correlation
    /// id is generated.
    pub fn build_context(
        &self,
        operation_type: &str,
        correlation_id: Option<&str>,
        idempotency_key: Option<&str>,
        user_id: Option<&str>,
    ) -> OrchestrationContext {
        let mut builder = OrchestrationContextBuilder::new(operation_type)
            .default_operation_type(self.config.default_operation_type.clone());
        if let Some(correlation_id) = correlation_id {
            builder = builder.correlation_id(correlation_id);
        }
        if let Some(idempotency_key) = idempotency_key {
            builder = builder.idempotency_key(idempotency_key);
        }
        if let Some(user_id) = user_id {
            builder = builder.user_id(user_id);
        }
        builder.build()
    }

    /// Run `request` through validation, preconditions, the executor and the
    /// optional post-commit verifier.
    ///
    /// Policies return `Some(reason)` to deny. Executor errors, panics, timeouts
    /// and cancellation all come back as a failed result; nothing escapes.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute<Req, Resp, V, P, X, Fut>(
        &self,
        context: &OrchestrationContext,
        request: Req,
        validation_policy: V,
        precondition_policy: P,
        executor: X,
        post_commit_verifier: Option<PostCommitVerifier<Resp>>,
        cancellation: Option<&CancellationToken>,
    ) -> OrchestrationResult<Resp>
    where
        V: FnOnce(&Req) -> Option<String>,
        P: FnOnce(&Req) -> Option<String>,
        X: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Resp, ExecutionError>>,
    {
        let mut run = StageRun::new(context, self.config.enable_stage_logging);

        if cancellation.is_some_and(CancellationToken::is_cancelled) {
            debug!(
                correlation_id = %context.correlation_id(),
                "Cancelled before the first stage"
            );
            return self.fail(
                run,
                StageFailure::from_code(
                    None,
                    FailureCategory::ExecutionFailure,
                    error_codes::OPERATION_CANCELLED,
                ),
            );
        }

        // Validate
        match evaluate_policy(validation_policy, &request) {
            PolicyVerdict::Pass => run.mark(OrchestrationStage::Validate, true),
            PolicyVerdict::Denied(denial) => {
                run.mark(OrchestrationStage::Validate, false);
                let failure = StageFailure {
                    stage: Some(OrchestrationStage::Validate),
                    category: FailureCategory::ValidationFailure,
                    error_code: error_codes::INVALID_REQUEST.to_string(),
                    remediation_hint: error_codes::remediation_hint(error_codes::INVALID_REQUEST)
                        .map(str::to_string),
                    error_message: denial,
                };
                return self.fail(run, failure);
            }
            PolicyVerdict::Faulted(fault) => {
                run.mark(OrchestrationStage::Validate, false);
                return self.fail_on_fault(run, OrchestrationStage::Validate, &fault);
            }
        }

        // CheckPreconditions
        match evaluate_policy(precondition_policy, &request) {
            PolicyVerdict::Pass => run.mark(OrchestrationStage::CheckPreconditions, true),
            PolicyVerdict::Denied(denial) => {
                run.mark(OrchestrationStage::CheckPreconditions, false);
                // A denial naming a known code gets that code's hint
                let remediation_hint = error_codes::remediation_hint(&denial)
                    .or_else(|| error_codes::remediation_hint(error_codes::PRECONDITION_FAILED))
                    .map(str::to_string);
                let failure = StageFailure {
                    stage: Some(OrchestrationStage::CheckPreconditions),
                    category: FailureCategory::PreconditionFailure,
                    error_code: error_codes::PRECONDITION_FAILED.to_string(),
                    error_message: denial,
                    remediation_hint,
                };
                return self.fail(run, failure);
            }
            PolicyVerdict::Faulted(fault) => {
                run.mark(OrchestrationStage::CheckPreconditions, false);
                return self.fail_on_fault(run, OrchestrationStage::CheckPreconditions, &fault);
            }
        }

        // Execute
        let response = match self.run_executor(executor, request, cancellation).await {
            Ok(response) => {
                run.mark(OrchestrationStage::Execute, true);
                response
            }
            Err(execution_error) => {
                run.mark(OrchestrationStage::Execute, false);
                let error_code = execution_error.error_code().to_string();
                warn!(
                    correlation_id = %context.correlation_id(),
                    operation_type = %context.operation_type(),
                    error_code = %error_code,
                    error = %execution_error,
                    "Executor failed"
                );
                return self.fail(
                    run,
                    StageFailure::from_code(
                        Some(OrchestrationStage::Execute),
                        FailureCategory::ExecutionFailure,
                        &error_code,
                    ),
                );
            }
        };

        // VerifyPostCommit
        let payload = match post_commit_verifier {
            None => response,
            Some(verifier) => {
                let verification = AssertUnwindSafe(async move { verifier(response).await })
                    .catch_unwind()
                    .await;
                match verification {
                    Ok(Ok(verified)) => {
                        run.mark(OrchestrationStage::VerifyPostCommit, true);
                        verified
                    }
                    Ok(Err(denial)) => {
                        run.mark(OrchestrationStage::VerifyPostCommit, false);
                        error!(
                            correlation_id = %context.correlation_id(),
                            operation_type = %context.operation_type(),
                            denial = %denial,
                            "Post-commit verification denied an applied operation"
                        );
                        return self.fail(
                            run,
                            StageFailure::from_code(
                                Some(OrchestrationStage::VerifyPostCommit),
                                FailureCategory::PostCommitFailure,
                                error_codes::POST_COMMIT_VERIFICATION_FAILED,
                            ),
                        );
                    }
                    Err(payload) => {
                        run.mark(OrchestrationStage::VerifyPostCommit, false);
                        let fault = ExecutionError::from_panic(payload);
                        error!(
                            correlation_id = %context.correlation_id(),
                            operation_type = %context.operation_type(),
                            error = %fault,
                            "Post-commit verifier panicked"
                        );
                        return self.fail(
                            run,
                            StageFailure::from_code(
                                Some(OrchestrationStage::VerifyPostCommit),
                                FailureCategory::PostCommitFailure,
                                error_codes::POST_COMMIT_VERIFICATION_FAILED,
                            ),
                        );
                    }
                }
            }
        };

        self.complete(run, payload)
    }

    /// Await the executor under the optional timeout and cancellation token,
    /// converting panics into `ExecutionError::Panicked`
    async fn run_executor<Req, Resp, X, Fut>(
        &self,
        executor: X,
        request: Req,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Resp, ExecutionError>
    where
        X: FnOnce(Req) -> Fut,
        Fut: Future<Output = Result<Resp, ExecutionError>>,
    {
        let future = match panic::catch_unwind(AssertUnwindSafe(|| executor(request))) {
            Ok(future) => future,
            Err(payload) => return Err(ExecutionError::from_panic(payload)),
        };

        let timeout = self.config.executor_timeout();
        let guarded = async move {
            let caught = AssertUnwindSafe(future).catch_unwind();
            let outcome = match timeout {
                Some(limit) => match tokio::time::timeout(limit, caught).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(ExecutionError::Timeout(format!(
                            "executor exceeded {}s",
                            limit.as_secs()
                        )))
                    }
                },
                None => caught.await,
            };
            outcome.unwrap_or_else(|payload| Err(ExecutionError::from_panic(payload)))
        };

        match cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(ExecutionError::Cancelled),
                    outcome = guarded => outcome,
                }
            }
            None => guarded.await,
        }
    }

    /// Faults inside a policy callable fail that stage without surfacing detail
    fn fail_on_fault<Resp>(
        &self,
        run: StageRun<'_>,
        stage: OrchestrationStage,
        fault: &str,
    ) -> OrchestrationResult<Resp> {
        error!(
            correlation_id = %run.context.correlation_id(),
            operation_type = %run.context.operation_type(),
            stage = %stage,
            error = %fault,
            "Policy callable panicked"
        );
        let category = FailureCategory::for_stage(stage).unwrap_or(FailureCategory::ExecutionFailure);
        self.fail(
            run,
            StageFailure::from_code(Some(stage), category, error_codes::INTERNAL_SERVER_ERROR),
        )
    }

    fn fail<Resp>(&self, run: StageRun<'_>, failure: StageFailure) -> OrchestrationResult<Resp> {
        let context = run.context;
        let retry_decision = self
            .classifier
            .classify_error(&failure.error_code, None, None);
        let duration_ms = run.elapsed_ms();

        let audit_summary = AuditSummary {
            operation_type: context.operation_type().to_string(),
            correlation_id: context.correlation_id().to_string(),
            idempotency_key: context.idempotency_key().map(str::to_string),
            user_id: context.user_id().map(str::to_string),
            initiated_at: context.initiated_at(),
            stage_reached: failure.stage,
            success: false,
            failure_code: Some(failure.error_code.clone()),
            failure_category: Some(failure.category),
            retry_decision: Some(retry_decision),
            duration_ms,
        };
        logging::log_orchestration_outcome(&audit_summary);

        OrchestrationResult {
            success: false,
            payload: None,
            error_code: Some(failure.error_code),
            error_message: Some(failure.error_message),
            remediation_hint: failure.remediation_hint,
            failure_category: Some(failure.category),
            completed_at_stage: OrchestrationStage::Failed,
            correlation_id: context.correlation_id().to_string(),
            idempotency_key: context.idempotency_key().map(str::to_string),
            total_duration_ms: duration_ms,
            stage_markers: run.markers,
            audit_summary,
        }
    }

    fn complete<Resp>(&self, run: StageRun<'_>, payload: Resp) -> OrchestrationResult<Resp> {
        let context = run.context;
        let duration_ms = run.elapsed_ms();

        let audit_summary = AuditSummary {
            operation_type: context.operation_type().to_string(),
            correlation_id: context.correlation_id().to_string(),
            idempotency_key: context.idempotency_key().map(str::to_string),
            user_id: context.user_id().map(str::to_string),
            initiated_at: context.initiated_at(),
            stage_reached: Some(OrchestrationStage::Completed),
            success: true,
            failure_code: None,
            failure_category: None,
            retry_decision: None,
            duration_ms,
        };
        logging::log_orchestration_outcome(&audit_summary);

        OrchestrationResult {
            success: true,
            payload: Some(payload),
            error_code: None,
            error_message: None,
            remediation_hint: None,
            failure_category: None,
            completed_at_stage: OrchestrationStage::Completed,
            correlation_id: context.correlation_id().to_string(),
            idempotency_key: context.idempotency_key().map(str::to_string),
            total_duration_ms: duration_ms,
            stage_markers: run.markers,
            audit_summary,
        }
    }
}
