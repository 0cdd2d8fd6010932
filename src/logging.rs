//! # Structured Logging Module
//!
//! Environment-aware structured logging for orchestration runs. Every pipeline
//! outcome is forwarded as one structured event keyed by correlation id so audit
//! trails can be stitched back together downstream.

use crate::config::LoggingConfig;
use crate::orchestration::types::AuditSummary;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// `RUST_LOG` takes precedence, then `LoggingConfig::level`, then a level derived
/// from the environment name. Safe to call more than once.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let directive = if config.level.trim().is_empty() {
            get_log_level(&environment).to_string()
        } else {
            config.level.clone()
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

        let layer = if config.json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A host application may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            json = config.json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("ISSUANCE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        "staging" => "info",
        _ => "debug",
    }
}

/// Forward an orchestration audit summary to the log
pub fn log_orchestration_outcome(summary: &AuditSummary) {
    if summary.success {
        tracing::info!(
            operation_type = %summary.operation_type,
            correlation_id = %summary.correlation_id,
            idempotency_key = summary.idempotency_key.as_deref(),
            user_id = summary.user_id.as_deref(),
            stage_reached = ?summary.stage_reached,
            duration_ms = summary.duration_ms,
            "ORCHESTRATION_COMPLETED"
        );
    } else {
        tracing::warn!(
            operation_type = %summary.operation_type,
            correlation_id = %summary.correlation_id,
            idempotency_key = summary.idempotency_key.as_deref(),
            user_id = summary.user_id.as_deref(),
            stage_reached = ?summary.stage_reached,
            failure_code = summary.failure_code.as_deref(),
            failure_category = ?summary.failure_category,
            retry_policy = ?summary.retry_decision.as_ref().map(|d| d.policy),
            duration_ms = summary.duration_ms,
            "ORCHESTRATION_FAILED"
        );
    }
}
