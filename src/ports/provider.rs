//! Provider Port - Shared contract of external processing components.
//!
//! Recognizers, transcribers, synthesizers and generators are all provider
//! components: they can be unavailable, and some load sub-providers (models,
//! voices) in the background after startup.

use thiserror::Error;

use crate::domain::workflow::LoadProgress;

/// Errors surfaced by provider components.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider failed: {0}")]
    Failed(String),
}

/// Capabilities every provider component declares.
pub trait ProviderComponent: Send + Sync {
    /// Component name used in logs and status output.
    fn name(&self) -> &str;

    /// Whether the component can serve requests right now.
    ///
    /// Unavailable components trigger fallback behaviour rather than errors.
    fn is_available(&self) -> bool {
        true
    }

    /// Loaded/total sub-provider counts, for components that load lazily.
    ///
    /// Components without loadable sub-providers return `None` and never hold
    /// a workflow back from readiness.
    fn load_progress(&self) -> Option<LoadProgress> {
        None
    }
}
