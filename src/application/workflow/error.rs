//! Workflow lifecycle errors.

use thiserror::Error;

use crate::domain::foundation::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("Workflow '{workflow}' requires component '{component}'")]
    MissingComponent { workflow: String, component: String },

    #[error("Invalid workflow configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Workflow '{workflow}' failed to initialize: {reason}")]
    Initialization { workflow: String, reason: String },

    #[error(transparent)]
    InvalidTransition(#[from] ValidationError),
}
