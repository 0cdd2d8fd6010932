//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery, environment
//! detection and layering of defaults, files and environment variables.

use super::error::{ConfigResult, ConfigurationError};
use super::IssuanceConfig;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Base file name searched for in the configuration directory
const CONFIG_FILE_STEM: &str = "issuance";
/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "ISSUANCE";

/// Loaded configuration together with where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: IssuanceConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for testing without modifying global environment variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        if !config_directory.is_dir() {
            return Err(ConfigurationError::DirectoryNotFound {
                path: config_directory,
            });
        }

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            max_attempts = config.retry.max_attempts,
            idempotency_enabled = config.idempotency.enabled,
            idempotency_ttl_seconds = config.idempotency.expiration_seconds,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Load configuration, falling back to safe defaults when loading fails
    pub fn default_or_load() -> Arc<ConfigManager> {
        match Self::load() {
            Ok(manager) => manager,
            Err(error) => {
                warn!(error = %error, "Configuration loading failed, using built-in defaults");
                Arc::new(Self::emergency_fallback())
            }
        }
    }

    /// Wrap an already-built configuration, e.g. in tests
    pub fn from_config(config: IssuanceConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &IssuanceConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("ISSUANCE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("ISSUANCE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn emergency_fallback() -> ConfigManager {
        ConfigManager {
            config: IssuanceConfig::default(),
            environment: Self::detect_environment(),
            config_directory: Self::default_config_directory(),
        }
    }

    fn load_and_merge_config(directory: &Path, environment: &str) -> ConfigResult<IssuanceConfig> {
        let defaults = Config::try_from(&IssuanceConfig::default())?;
        let base_file = directory.join(CONFIG_FILE_STEM);
        let env_file = directory.join(format!("{CONFIG_FILE_STEM}.{environment}"));

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(&base_file.to_string_lossy()).required(false))
            .add_source(File::with_name(&env_file.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::EnvironmentConfigError {
                environment: environment.to_string(),
                error: e.to_string(),
            })?;

        merged
            .try_deserialize::<IssuanceConfig>()
            .map_err(|e| ConfigurationError::load_failed(directory.display().to_string(), e))
    }
}
