//! Application configuration module
//!
//! This module provides type-safe configuration loading using the `config` and
//! `dotenvy` crates. Values come from an optional TOML file and from
//! environment variables with the `ASSISTANT` prefix, nested with `__`.
//!
//! # Example
//!
//! ```no_run
//! use assistant_core::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Default workflow: {}", config.workflows.default_workflow);
//! ```

mod dispatch;
mod error;
mod logging;
mod sessions;
mod workflows;

pub use dispatch::DispatchConfig;
pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use sessions::{SessionsConfig, MAX_RETENTION_AGE_HOURS};
pub use workflows::{StagesConfig, WorkflowsConfig};

use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::Deserialize;
use std::path::Path;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "ASSISTANT";

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "ASSISTANT_CONFIG_FILE";

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Log filter and output format
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Enabled workflows, default workflow, stage defaults
    #[serde(default)]
    pub workflows: WorkflowsConfig,

    /// Session defaults and cleanup cadence
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Handler registration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

impl AppConfig {
    /// Load configuration from the environment
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads the file named by `ASSISTANT_CONFIG_FILE`, if set
    /// 3. Reads environment variables with `ASSISTANT` prefix, which override
    ///    the file
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `ASSISTANT__WORKFLOWS__DEFAULT_WORKFLOW=voice_assistant`
    /// - `ASSISTANT__WORKFLOWS__ENABLED=voice_assistant,kiosk`
    /// - `ASSISTANT__SESSIONS__CLEANUP_INTERVAL_SECS=600`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or values cannot be
    /// parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&path));
        }
        Self::build(builder)
    }

    /// Load configuration from a specific file, with environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = config::Config::builder().add_source(config::File::from(path.as_ref()));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("workflows.enabled"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.workflows.validate()?;
        self.sessions.validate()?;
        Ok(())
    }
}
