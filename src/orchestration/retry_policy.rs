//! # Retry Policy Classification
//!
//! Maps the stable error-code taxonomy onto retry policies and derives backoff
//! schedules from them.
//!
//! ## Overview
//!
//! Every failure leaving the orchestration pipeline carries an error code from
//! [`crate::constants::error_codes`]. The classifier turns that code into a
//! [`RetryPolicyDecision`] so callers (HTTP handlers, job schedulers) can decide
//! whether and when to try again without knowing anything about the executor
//! that failed.
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────┐     ┌─────────────────────┐
//! │ Error Code      │────▶│ RetryPolicyClassifier│────▶│ RetryPolicyDecision │
//! │ + Category Hint │     │ (code table)         │     │ + backoff schedule  │
//! └─────────────────┘     └──────────────────────┘     └─────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use issuance_core::orchestration::retry_policy::{RetryPolicy, RetryPolicyClassifier};
//! use chrono::Utc;
//!
//! let classifier = RetryPolicyClassifier::new();
//! let decision = classifier.classify_error("RATE_LIMIT_EXCEEDED", None, None);
//! assert_eq!(decision.policy, RetryPolicy::RetryableWithCooldown);
//!
//! let first_attempt = Utc::now();
//! if classifier.should_retry(decision.policy, 1, first_attempt) {
//!     let delay = classifier.calculate_retry_delay(decision.policy, 1, true);
//!     assert!(delay > 0);
//! }
//! ```

use crate::config::{IssuanceConfig, RetryConfig};
use crate::constants::error_codes::*;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Context key an executor may set to forward a server-provided `Retry-After`
pub const RETRY_AFTER_CONTEXT_KEY: &str = "retry_after_seconds";

/// How a failed operation may be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retrying the same request cannot succeed
    NotRetryable,

    /// Retry right away
    RetryableImmediate,

    /// Transient infrastructure failure, retry after a short delay
    RetryableWithDelay,

    /// Load shedding, retry after a longer cooldown
    RetryableWithCooldown,

    /// Retry only once the caller has fixed something (KYC, subscription)
    RetryableAfterRemediation,
}

impl RetryPolicy {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotRetryable)
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotRetryable => write!(f, "Not Retryable"),
            Self::RetryableImmediate => write!(f, "Retryable Immediately"),
            Self::RetryableWithDelay => write!(f, "Retryable With Delay"),
            Self::RetryableWithCooldown => write!(f, "Retryable With Cooldown"),
            Self::RetryableAfterRemediation => write!(f, "Retryable After Remediation"),
        }
    }
}

/// Broad failure category a caller may supply for codes outside the taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or rejected request
    Validation,

    /// Missing or invalid credentials
    Authentication,

    /// Resource already exists or state conflict
    Conflict,

    /// Transient failure that may succeed on retry
    Transient,

    /// Connectivity failure
    Network,

    /// Operation exceeded its time budget
    Timeout,

    /// Rate limiting or circuit breaking
    RateLimit,

    /// Caller must complete an action first
    Remediation,

    /// Nothing known about the failure
    Unknown,
}

impl ErrorCategory {
    /// Fallback policy for an unrecognized code carrying this category
    pub fn default_policy(&self) -> RetryPolicy {
        match self {
            Self::Validation | Self::Authentication | Self::Conflict | Self::Unknown => {
                RetryPolicy::NotRetryable
            }
            Self::Transient | Self::Network | Self::Timeout => RetryPolicy::RetryableWithDelay,
            Self::RateLimit => RetryPolicy::RetryableWithCooldown,
            Self::Remediation => RetryPolicy::RetryableAfterRemediation,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "Validation"),
            Self::Authentication => write!(f, "Authentication"),
            Self::Conflict => write!(f, "Conflict"),
            Self::Transient => write!(f, "Transient"),
            Self::Network => write!(f, "Network"),
            Self::Timeout => write!(f, "Timeout"),
            Self::RateLimit => write!(f, "Rate Limit"),
            Self::Remediation => write!(f, "Remediation"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of classifying one error code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicyDecision {
    pub policy: RetryPolicy,

    /// Human-readable reason for the policy; never empty
    pub explanation: String,
}

/// Policy and reason for every code in the taxonomy
fn policy_table(error_code: &str) -> Option<(RetryPolicy, &'static str)> {
    let entry = match error_code {
        INVALID_REQUEST | MISSING_REQUIRED_FIELD | INVALID_NETWORK | INVALID_TOKEN_PARAMETERS
        | METADATA_VALIDATION_FAILED | INVALID_TOKEN_STANDARD => (
            RetryPolicy::NotRetryable,
            "the request is invalid and must be corrected",
        ),
        UNAUTHORIZED | FORBIDDEN | INVALID_AUTH_TOKEN | INVALID_CREDENTIALS => (
            RetryPolicy::NotRetryable,
            "the caller is not authorized for this operation",
        ),
        ALREADY_EXISTS | USER_ALREADY_EXISTS | CONFLICT | IDEMPOTENCY_KEY_MISMATCH => (
            RetryPolicy::NotRetryable,
            "the request conflicts with existing state",
        ),
        INVALID_STATE_TRANSITION => (
            RetryPolicy::NotRetryable,
            "the requested lifecycle change is not permitted",
        ),
        POST_COMMIT_VERIFICATION_FAILED => (
            RetryPolicy::NotRetryable,
            "side effects were applied and must be reconciled before any retry",
        ),
        OPERATION_FAILED | INTERNAL_SERVER_ERROR => (
            RetryPolicy::NotRetryable,
            "the outcome of the failed attempt is unknown and needs investigation",
        ),
        BLOCKCHAIN_CONNECTION_ERROR | IPFS_SERVICE_ERROR | EXTERNAL_SERVICE_ERROR | TIMEOUT
        | BLOCKCHAIN_TIMEOUT | NETWORK_ERROR => (
            RetryPolicy::RetryableWithDelay,
            "a transient infrastructure failure that usually clears after a short delay",
        ),
        RATE_LIMIT_EXCEEDED | CIRCUIT_BREAKER_OPEN | SUBSCRIPTION_LIMIT_REACHED => (
            RetryPolicy::RetryableWithCooldown,
            "a capacity limit was hit and needs a cooldown period",
        ),
        KYC_NOT_VERIFIED | KYC_REQUIRED | SUBSCRIPTION_REQUIRED | PRECONDITION_FAILED => (
            RetryPolicy::RetryableAfterRemediation,
            "a business precondition must be satisfied by the caller first",
        ),
        OPERATION_CANCELLED => (
            RetryPolicy::RetryableImmediate,
            "the operation was cancelled before completion and can be resubmitted",
        ),
        _ => return None,
    };
    Some(entry)
}

/// Classifies error codes and computes retry schedules
#[derive(Debug, Clone)]
pub struct RetryPolicyClassifier {
    config: RetryConfig,
}

impl Default for RetryPolicyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyClassifier {
    /// Classifier with the built-in schedule
    pub fn new() -> Self {
        Self {
            config: IssuanceConfig::default().retry,
        }
    }

    pub fn with_config(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Policy for a code in the taxonomy, `None` for unrecognized codes
    pub fn policy_for_code(error_code: &str) -> Option<RetryPolicy> {
        policy_table(error_code).map(|(policy, _)| policy)
    }

    /// Classify an error code. Total: every input yields a decision with a
    /// non-empty explanation.
    pub fn classify_error(
        &self,
        error_code: &str,
        category: Option<ErrorCategory>,
        context_data: Option<&HashMap<String, Value>>,
    ) -> RetryPolicyDecision {
        let display_code = if error_code.trim().is_empty() {
            "<empty>"
        } else {
            error_code
        };

        let (policy, mut explanation) = match (policy_table(error_code), category) {
            (Some((policy, reason)), _) => (policy, format!("{display_code}: {reason}")),
            (None, Some(category)) => {
                let policy = category.default_policy();
                (
                    policy,
                    format!(
                        "{display_code} is not a recognized error code; classified as {policy} from its {category} category"
                    ),
                )
            }
            (None, None) => (
                RetryPolicy::NotRetryable,
                format!("{display_code} is not a recognized error code; not retrying without a category hint"),
            ),
        };

        if policy.is_retryable() {
            if let Some(seconds) = context_data
                .and_then(|data| data.get(RETRY_AFTER_CONTEXT_KEY))
                .and_then(Value::as_u64)
            {
                explanation.push_str(&format!(" (server requested retry after {seconds}s)"));
            }
        }

        tracing::debug!(
            error_code = %display_code,
            category = ?category,
            policy = %policy,
            "Classified error code"
        );

        RetryPolicyDecision {
            policy,
            explanation,
        }
    }

    /// Whether another attempt is allowed. Attempt counts are 1-based: the
    /// attempt that just failed is `attempt_count`.
    pub fn should_retry(
        &self,
        policy: RetryPolicy,
        attempt_count: u32,
        first_attempt_time: DateTime<Utc>,
    ) -> bool {
        if !policy.is_retryable() || attempt_count >= self.config.max_attempts {
            return false;
        }

        // A first attempt stamped in the future counts as no elapsed time
        let elapsed = (Utc::now() - first_attempt_time)
            .to_std()
            .unwrap_or_default();
        elapsed <= self.config.retry_window()
    }

    /// Delay in seconds before the next attempt; 0 for `NotRetryable`
    pub fn calculate_retry_delay(
        &self,
        policy: RetryPolicy,
        attempt_count: u32,
        use_exponential_backoff: bool,
    ) -> u64 {
        let base = match policy {
            RetryPolicy::NotRetryable => return 0,
            RetryPolicy::RetryableImmediate => {
                return self.config.immediate_delay_seconds.max(1);
            }
            RetryPolicy::RetryableWithDelay => self.config.delay_base_seconds,
            RetryPolicy::RetryableWithCooldown => self.config.cooldown_base_seconds,
            RetryPolicy::RetryableAfterRemediation => self.config.remediation_base_seconds,
        }
        .max(1);
        let cap = self.config.max_delay_seconds.max(base);

        if !use_exponential_backoff {
            return base;
        }

        let exponent = attempt_count.saturating_sub(1).min(63) as i32;
        let multiplier = self.config.backoff_multiplier.max(1.0);
        let delay = (base as f64) * multiplier.powi(exponent);
        if delay.is_finite() && delay < cap as f64 {
            (delay as u64).max(base)
        } else {
            cap
        }
    }

    /// Timestamp of the next attempt, or `None` when no retry is allowed
    pub fn next_retry_at(
        &self,
        policy: RetryPolicy,
        attempt_count: u32,
        first_attempt_time: DateTime<Utc>,
        use_exponential_backoff: bool,
    ) -> Option<DateTime<Utc>> {
        if !self.should_retry(policy, attempt_count, first_attempt_time) {
            return None;
        }
        let delay = self.calculate_retry_delay(policy, attempt_count, use_exponential_backoff);
        let delay = ChronoDuration::try_seconds(i64::try_from(delay).ok()?)?;
        Utc::now().checked_add_signed(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_groups() {
        let classifier = RetryPolicyClassifier::new();
        let cases = [
            (INVALID_REQUEST, RetryPolicy::NotRetryable),
            (FORBIDDEN, RetryPolicy::NotRetryable),
            (CONFLICT, RetryPolicy::NotRetryable),
            (BLOCKCHAIN_TIMEOUT, RetryPolicy::RetryableWithDelay),
            (IPFS_SERVICE_ERROR, RetryPolicy::RetryableWithDelay),
            (CIRCUIT_BREAKER_OPEN, RetryPolicy::RetryableWithCooldown),
            (SUBSCRIPTION_LIMIT_REACHED, RetryPolicy::RetryableWithCooldown),
            (KYC_NOT_VERIFIED, RetryPolicy::RetryableAfterRemediation),
            (PRECONDITION_FAILED, RetryPolicy::RetryableAfterRemediation),
            (OPERATION_CANCELLED, RetryPolicy::RetryableImmediate),
            (POST_COMMIT_VERIFICATION_FAILED, RetryPolicy::NotRetryable),
        ];

        for (code, expected) in cases {
            let decision = classifier.classify_error(code, None, None);
            assert_eq!(decision.policy, expected, "wrong policy for {code}");
            assert!(decision.explanation.contains(code));
        }
    }

    #[test]
    fn test_unknown_code_without_category_is_not_retryable() {
        let decision = RetryPolicyClassifier::new().classify_error("TOTALLY_NEW_CODE", None, None);
        assert_eq!(decision.policy, RetryPolicy::NotRetryable);
        assert!(decision.explanation.contains("TOTALLY_NEW_CODE"));
    }

    #[test]
    fn test_unknown_code_falls_back_to_category() {
        let classifier = RetryPolicyClassifier::new();
        let decision = classifier.classify_error("GATEWAY_HICCUP", Some(ErrorCategory::Network), None);
        assert_eq!(decision.policy, RetryPolicy::RetryableWithDelay);

        let decision = classifier.classify_error("QUOTA", Some(ErrorCategory::RateLimit), None);
        assert_eq!(decision.policy, RetryPolicy::RetryableWithCooldown);
    }

    #[test]
    fn test_known_code_ignores_category_hint() {
        let decision = RetryPolicyClassifier::new().classify_error(
            INVALID_REQUEST,
            Some(ErrorCategory::Transient),
            None,
        );
        assert_eq!(decision.policy, RetryPolicy::NotRetryable);
    }

    #[test]
    fn test_empty_code_still_explained() {
        let decision = RetryPolicyClassifier::new().classify_error("", None, None);
        assert_eq!(decision.policy, RetryPolicy::NotRetryable);
        assert!(!decision.explanation.is_empty());
    }

    #[test]
    fn test_retry_after_context_is_reported() {
        let mut context = HashMap::new();
        context.insert(RETRY_AFTER_CONTEXT_KEY.to_string(), Value::from(30u64));
        let decision =
            RetryPolicyClassifier::new().classify_error(RATE_LIMIT_EXCEEDED, None, Some(&context));
        assert!(decision.explanation.contains("30s"));
    }

    #[test]
    fn test_should_retry_limits() {
        let classifier = RetryPolicyClassifier::new();
        let now = Utc::now();

        assert!(!classifier.should_retry(RetryPolicy::NotRetryable, 1, now));
        assert!(classifier.should_retry(RetryPolicy::RetryableWithDelay, 1, now));
        assert!(classifier.should_retry(RetryPolicy::RetryableWithDelay, 9, now));
        assert!(!classifier.should_retry(RetryPolicy::RetryableWithDelay, 10, now));

        let two_days_ago = now - ChronoDuration::hours(48);
        assert!(!classifier.should_retry(RetryPolicy::RetryableImmediate, 1, two_days_ago));
    }

    #[test]
    fn test_delay_schedule() {
        let classifier = RetryPolicyClassifier::new();

        assert_eq!(classifier.calculate_retry_delay(RetryPolicy::NotRetryable, 3, true), 0);
        assert_eq!(classifier.calculate_retry_delay(RetryPolicy::RetryableImmediate, 5, true), 1);
        assert_eq!(classifier.calculate_retry_delay(RetryPolicy::RetryableWithDelay, 1, true), 5);
        assert_eq!(classifier.calculate_retry_delay(RetryPolicy::RetryableWithDelay, 3, true), 20);
        assert_eq!(classifier.calculate_retry_delay(RetryPolicy::RetryableWithDelay, 3, false), 5);
        assert_eq!(
            classifier.calculate_retry_delay(RetryPolicy::RetryableWithCooldown, 40, true),
            3600
        );
    }

    #[test]
    fn test_exponential_delay_is_non_decreasing() {
        let classifier = RetryPolicyClassifier::new();
        for policy in [
            RetryPolicy::RetryableImmediate,
            RetryPolicy::RetryableWithDelay,
            RetryPolicy::RetryableWithCooldown,
            RetryPolicy::RetryableAfterRemediation,
        ] {
            let mut previous = 0;
            for attempt in 0..80 {
                let delay = classifier.calculate_retry_delay(policy, attempt, true);
                assert!(delay > 0);
                assert!(delay >= previous, "{policy} decreased at attempt {attempt}");
                previous = delay;
            }
        }
    }

    #[test]
    fn test_next_retry_at() {
        let classifier = RetryPolicyClassifier::new();
        let now = Utc::now();

        assert!(classifier
            .next_retry_at(RetryPolicy::NotRetryable, 1, now, true)
            .is_none());

        let next = classifier
            .next_retry_at(RetryPolicy::RetryableWithDelay, 2, now, true)
            .unwrap();
        assert!(next >= now + ChronoDuration::seconds(10));
    }

    #[test]
    fn test_unbounded_window_does_not_panic() {
        let mut config = IssuanceConfig::default().retry;
        config.retry_window_seconds = u64::MAX;
        let classifier = RetryPolicyClassifier::with_config(config);

        assert!(classifier.should_retry(RetryPolicy::RetryableWithDelay, 1, Utc::now()));
        assert!(classifier.should_retry(
            RetryPolicy::RetryableWithDelay,
            1,
            DateTime::<Utc>::MIN_UTC
        ));
    }

    #[test]
    fn test_unrepresentable_delay_yields_no_timestamp() {
        let mut config = IssuanceConfig::default().retry;
        config.max_delay_seconds = u64::MAX / 2;
        config.remediation_base_seconds = u64::MAX / 4;
        let classifier = RetryPolicyClassifier::with_config(config);
        let now = Utc::now();

        assert!(
            classifier.calculate_retry_delay(RetryPolicy::RetryableAfterRemediation, 1, true)
                >= u64::MAX / 4
        );
        assert!(classifier
            .next_retry_at(RetryPolicy::RetryableAfterRemediation, 1, now, true)
            .is_none());
    }
}
