//! # Issuance Core Configuration
//!
//! Layered configuration for the orchestration core. Values come from built-in
//! defaults, then `issuance.toml` (or `.yaml`/`.json`), then an environment-specific
//! override file `issuance.<env>.toml`, then `ISSUANCE__SECTION__FIELD` environment
//! variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use issuance_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let max_attempts = manager.config().retry.max_attempts;
//! let ttl = manager.config().idempotency.expiration();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::system;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring issuance.toml
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IssuanceConfig {
    /// Orchestration pipeline behavior
    pub pipeline: PipelineConfig,

    /// Retry classification and backoff schedule
    pub retry: RetryConfig,

    /// Idempotency key guard
    pub idempotency: IdempotencyConfig,

    /// Structured logging
    pub logging: LoggingConfig,
}

/// Orchestration pipeline configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Operation type substituted when a caller supplies none
    pub default_operation_type: String,
    /// Upper bound for the execute stage; 0 disables the bound
    pub executor_timeout_seconds: u64,
    /// Emit a debug event for every stage marker
    pub enable_stage_logging: bool,
}

impl PipelineConfig {
    /// Get the executor timeout as Duration, if one is configured
    pub fn executor_timeout(&self) -> Option<Duration> {
        (self.executor_timeout_seconds > 0).then(|| Duration::from_secs(self.executor_timeout_seconds))
    }
}

/// Backoff and retry configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Attempt ceiling; `should_retry` is false once reached
    pub max_attempts: u32,
    /// Window after the first attempt during which retries are allowed
    pub retry_window_seconds: u64,
    pub immediate_delay_seconds: u64,
    pub delay_base_seconds: u64,
    pub cooldown_base_seconds: u64,
    pub remediation_base_seconds: u64,
    pub backoff_multiplier: f64,
    pub max_delay_seconds: u64,
}

impl RetryConfig {
    /// Get retry window as Duration
    pub fn retry_window(&self) -> Duration {
        Duration::from_secs(self.retry_window_seconds)
    }
}

/// Idempotency key guard configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IdempotencyConfig {
    pub enabled: bool,
    /// Lifetime of a cached response
    pub expiration_seconds: u64,
    /// Namespace prefixed to every key so operations never share records
    pub key_prefix: String,
    /// Period of the background sweep started by `IdempotencyGuard::spawn_purge_task`
    pub purge_interval_seconds: u64,
}

impl IdempotencyConfig {
    /// Get record expiration as Duration
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_seconds)
    }

    /// Get the store sweep period as Duration
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Explicit filter directive; empty means derive it from the environment
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig {
                default_operation_type: system::UNSPECIFIED_OPERATION.to_string(),
                executor_timeout_seconds: 0,
                enable_stage_logging: false,
            },
            retry: RetryConfig {
                max_attempts: system::MAX_RETRY_ATTEMPTS,
                retry_window_seconds: system::RETRY_WINDOW_SECONDS,
                immediate_delay_seconds: 1,
                delay_base_seconds: 5,
                cooldown_base_seconds: 60,
                remediation_base_seconds: 300,
                backoff_multiplier: 2.0,
                max_delay_seconds: 3600,
            },
            idempotency: IdempotencyConfig {
                enabled: true,
                expiration_seconds: system::IDEMPOTENCY_EXPIRATION_SECONDS,
                key_prefix: "idempotency".to_string(),
                purge_interval_seconds: system::IDEMPOTENCY_PURGE_INTERVAL_SECONDS,
            },
            logging: LoggingConfig {
                level: String::new(),
                json: false,
            },
        }
    }
}

impl IssuanceConfig {
    /// Reject configurations that would break classifier or guard invariants
    pub fn validate(&self) -> ConfigResult<()> {
        let retry = &self.retry;

        if retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                retry.max_attempts,
                "must allow at least one attempt",
            ));
        }

        for (field, value) in [
            ("retry.immediate_delay_seconds", retry.immediate_delay_seconds),
            ("retry.delay_base_seconds", retry.delay_base_seconds),
            ("retry.cooldown_base_seconds", retry.cooldown_base_seconds),
            ("retry.remediation_base_seconds", retry.remediation_base_seconds),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    "retry delays must be strictly positive",
                ));
            }
            if value > retry.max_delay_seconds {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    format!("exceeds retry.max_delay_seconds ({})", retry.max_delay_seconds),
                ));
            }
        }

        for (field, value) in [
            ("retry.max_delay_seconds", retry.max_delay_seconds),
            ("retry.retry_window_seconds", retry.retry_window_seconds),
            ("idempotency.expiration_seconds", self.idempotency.expiration_seconds),
            ("idempotency.purge_interval_seconds", self.idempotency.purge_interval_seconds),
            ("pipeline.executor_timeout_seconds", self.pipeline.executor_timeout_seconds),
        ] {
            if value > system::MAX_CONFIGURED_SECONDS {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value,
                    format!("exceeds {} seconds (365 days)", system::MAX_CONFIGURED_SECONDS),
                ));
            }
        }

        if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_multiplier",
                retry.backoff_multiplier,
                "must be a finite number >= 1.0",
            ));
        }

        if self.idempotency.expiration_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "idempotency.expiration_seconds",
                self.idempotency.expiration_seconds,
                "records must live for at least one second",
            ));
        }

        if self.idempotency.purge_interval_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "idempotency.purge_interval_seconds",
                self.idempotency.purge_interval_seconds,
                "sweeps need a period of at least one second",
            ));
        }

        if self.pipeline.default_operation_type.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "pipeline.default_operation_type",
                "",
                "a non-empty fallback operation type is required",
            ));
        }

        Ok(())
    }
}
