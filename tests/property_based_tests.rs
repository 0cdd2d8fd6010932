//! Property-based checks for the pure decision functions.

mod common;

use chrono::Utc;
use common::*;
use issuance_core::idempotency::{canonical_json, request_fingerprint};
use issuance_core::state_machine::guards::{IDEMPOTENT_UPDATE, TERMINAL_STATE_VIOLATION};
use issuance_core::{RetryPolicy, RetryPolicyClassifier, StateTransitionGuard};
use proptest::prelude::*;

/// Render an object with its keys in reverse order
fn reversed_object_text(value: &serde_json::Value) -> String {
    let map = value.as_object().cloned().unwrap_or_default();
    let fields: Vec<String> = map
        .iter()
        .rev()
        .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), v))
        .collect();
    format!("{{{}}}", fields.join(","))
}

proptest! {
    #[test]
    fn same_state_is_always_idempotent(status in deployment_status_strategy()) {
        let result = StateTransitionGuard::validate_transition(status, status);
        prop_assert!(result.is_allowed);
        prop_assert_eq!(result.reason_code, IDEMPOTENT_UPDATE);
    }

    #[test]
    fn terminal_states_never_leave(
        from in deployment_status_strategy(),
        to in deployment_status_strategy(),
    ) {
        prop_assume!(from != to);
        let result = StateTransitionGuard::validate_transition(from, to);
        if StateTransitionGuard::is_terminal_state(from) {
            prop_assert!(!result.is_allowed);
            prop_assert_eq!(result.reason_code, TERMINAL_STATE_VIOLATION);
        } else {
            prop_assert_eq!(
                result.is_allowed,
                StateTransitionGuard::valid_next_states(from).contains(&to)
            );
        }
    }

    #[test]
    fn classification_is_total(
        code in error_code_strategy(),
        category in proptest::option::of(error_category_strategy()),
    ) {
        let classifier = RetryPolicyClassifier::new();
        let decision = classifier.classify_error(&code, category, None);
        prop_assert!(!decision.explanation.trim().is_empty());

        let again = classifier.classify_error(&code, category, None);
        prop_assert_eq!(decision, again);
    }

    #[test]
    fn known_codes_ignore_category_hint(
        code in proptest::sample::select(KNOWN_ERROR_CODES.to_vec()),
        category in error_category_strategy(),
    ) {
        let classifier = RetryPolicyClassifier::new();
        let hinted = classifier.classify_error(code, Some(category), None);
        prop_assert_eq!(Some(hinted.policy), RetryPolicyClassifier::policy_for_code(code));
    }

    #[test]
    fn retry_delay_is_positive_and_monotone(
        policy in retryable_policy_strategy(),
        attempt in 1u32..40,
    ) {
        let classifier = RetryPolicyClassifier::new();
        let current = classifier.calculate_retry_delay(policy, attempt, true);
        let next = classifier.calculate_retry_delay(policy, attempt + 1, true);

        prop_assert!(current >= 1);
        prop_assert!(next >= current);
        prop_assert!(current <= classifier.config().max_delay_seconds.max(1));
    }

    #[test]
    fn not_retryable_never_waits_or_retries(attempt in 0u32..100, exponential in any::<bool>()) {
        let classifier = RetryPolicyClassifier::new();
        prop_assert_eq!(
            classifier.calculate_retry_delay(RetryPolicy::NotRetryable, attempt, exponential),
            0
        );
        prop_assert!(!classifier.should_retry(RetryPolicy::NotRetryable, attempt, Utc::now()));
    }

    #[test]
    fn attempt_ceiling_stops_retries(policy in retry_policy_strategy(), extra in 0u32..10) {
        let classifier = RetryPolicyClassifier::new();
        let attempt = classifier.config().max_attempts + extra;
        prop_assert!(!classifier.should_retry(policy, attempt, Utc::now()));
    }

    #[test]
    fn fingerprint_ignores_key_order(request in json_request_strategy()) {
        let reordered: serde_json::Value =
            serde_json::from_str(&reversed_object_text(&request)).unwrap();

        prop_assert_eq!(
            canonical_json(&request).unwrap(),
            canonical_json(&reordered).unwrap()
        );
        prop_assert_eq!(
            request_fingerprint(&request).unwrap(),
            request_fingerprint(&reordered).unwrap()
        );
    }

    #[test]
    fn fingerprint_is_hex_sha256(request in json_request_strategy()) {
        let fingerprint = request_fingerprint(&request).unwrap();
        prop_assert_eq!(fingerprint.len(), 64);
        prop_assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn distinct_symbols_fingerprint_differently(a in "[A-Z]{1,6}", b in "[A-Z]{1,6}") {
        prop_assume!(a != b);
        let first = TokenRequestBuilder::new().with_symbol(&a).build();
        let second = TokenRequestBuilder::new().with_symbol(&b).build();
        prop_assert_ne!(
            request_fingerprint(&first).unwrap(),
            request_fingerprint(&second).unwrap()
        );
    }
}
