//! Configuration Error Types
//!
//! Specific, actionable error messages for configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration directory does not exist
    #[error("Configuration directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// A source could not be read or parsed
    #[error("Failed to load configuration from {source_description}: {error}")]
    LoadFailed {
        source_description: String,
        error: String,
    },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Environment-specific configuration issues
    #[error("Environment configuration error for '{environment}': {error}")]
    EnvironmentConfigError { environment: String, error: String },
}

impl ConfigurationError {
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl ToString,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            context: context.into(),
        }
    }

    pub fn load_failed(source_description: impl Into<String>, error: impl ToString) -> Self {
        Self::LoadFailed {
            source_description: source_description.into(),
            error: error.to_string(),
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        Self::load_failed("layered configuration sources", error)
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
