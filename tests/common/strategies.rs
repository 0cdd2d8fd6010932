#![allow(dead_code)]

use issuance_core::constants::error_codes::*;
use issuance_core::orchestration::ErrorCategory;
use issuance_core::{DeploymentStatus, RetryPolicy};
use proptest::prelude::*;
use proptest::sample::select;

/// Every code in the taxonomy the classifier recognizes
pub const KNOWN_ERROR_CODES: &[&str] = &[
    INVALID_REQUEST,
    MISSING_REQUIRED_FIELD,
    INVALID_NETWORK,
    INVALID_TOKEN_PARAMETERS,
    METADATA_VALIDATION_FAILED,
    INVALID_TOKEN_STANDARD,
    UNAUTHORIZED,
    FORBIDDEN,
    INVALID_AUTH_TOKEN,
    INVALID_CREDENTIALS,
    ALREADY_EXISTS,
    USER_ALREADY_EXISTS,
    CONFLICT,
    IDEMPOTENCY_KEY_MISMATCH,
    INVALID_STATE_TRANSITION,
    BLOCKCHAIN_CONNECTION_ERROR,
    IPFS_SERVICE_ERROR,
    EXTERNAL_SERVICE_ERROR,
    TIMEOUT,
    BLOCKCHAIN_TIMEOUT,
    NETWORK_ERROR,
    RATE_LIMIT_EXCEEDED,
    CIRCUIT_BREAKER_OPEN,
    SUBSCRIPTION_LIMIT_REACHED,
    KYC_NOT_VERIFIED,
    KYC_REQUIRED,
    SUBSCRIPTION_REQUIRED,
    PRECONDITION_FAILED,
    OPERATION_FAILED,
    OPERATION_CANCELLED,
    POST_COMMIT_VERIFICATION_FAILED,
    INTERNAL_SERVER_ERROR,
];

pub fn deployment_status_strategy() -> impl Strategy<Value = DeploymentStatus> {
    select(DeploymentStatus::ALL.to_vec())
}

pub fn retry_policy_strategy() -> impl Strategy<Value = RetryPolicy> {
    select(vec![
        RetryPolicy::NotRetryable,
        RetryPolicy::RetryableImmediate,
        RetryPolicy::RetryableWithDelay,
        RetryPolicy::RetryableWithCooldown,
        RetryPolicy::RetryableAfterRemediation,
    ])
}

pub fn retryable_policy_strategy() -> impl Strategy<Value = RetryPolicy> {
    retry_policy_strategy().prop_filter("retryable only", |policy| policy.is_retryable())
}

pub fn error_category_strategy() -> impl Strategy<Value = ErrorCategory> {
    select(vec![
        ErrorCategory::Validation,
        ErrorCategory::Authentication,
        ErrorCategory::Conflict,
        ErrorCategory::Transient,
        ErrorCategory::Network,
        ErrorCategory::Timeout,
        ErrorCategory::RateLimit,
        ErrorCategory::Remediation,
        ErrorCategory::Unknown,
    ])
}

/// Known codes mixed with arbitrary strings, including empty ones
pub fn error_code_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        select(KNOWN_ERROR_CODES.to_vec()).prop_map(str::to_string),
        "[A-Z_]{0,32}",
        ".{0,16}",
    ]
}

/// Flat JSON objects with a handful of scalar fields
pub fn json_request_strategy() -> impl Strategy<Value = serde_json::Value> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            "[a-zA-Z0-9 ]{0,12}".prop_map(serde_json::Value::from),
        ],
        0..6,
    )
    .prop_map(|map| serde_json::Value::Object(map.into_iter().collect()))
}
