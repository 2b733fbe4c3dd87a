//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No workflows enabled")]
    NoWorkflowsEnabled,

    #[error("Default workflow '{0}' is not enabled")]
    DefaultWorkflowNotEnabled(String),

    #[error("Progress poll interval must be positive")]
    InvalidPollInterval,

    #[error("Session cleanup interval must be positive")]
    InvalidCleanupInterval,

    #[error("Retention policy '{0}' must keep at least one entry")]
    InvalidRetention(&'static str),

    #[error("Retention policy '{0}' max age exceeds the supported range")]
    RetentionAgeTooLong(&'static str),

    #[error("Default language must not be empty")]
    MissingLanguage,
}
