//! Errors raised while registering handlers and dispatching intents.
//!
//! Registration errors are fatal for the affected handler and surface once at
//! startup. Dispatch errors are per-request and always end up as a failed
//! `IntentResult`.

use thiserror::Error;

use crate::domain::foundation::ErrorCode;

/// Fatal, load-time problems with a handler's routing data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Handler '{handler}' has no pattern table loaded")]
    DonationMissing { handler: String },

    #[error("Handler '{handler}' has no function bound for methods: {}", methods.join(", "))]
    UnboundMethods {
        handler: String,
        methods: Vec<String>,
    },
}

/// Recoverable, per-request dispatch failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Handler '{handler}' has no pattern table loaded")]
    DonationMissing { handler: String },

    #[error("No method bound to intent '{intent}'")]
    MethodNotFound { intent: String },

    #[error("Method '{method}' is declared but not implemented")]
    MethodNotImplemented { method: String },

    #[error("Method '{method}' failed: {cause}")]
    MethodExecution { method: String, cause: String },
}

impl DispatchError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::DonationMissing { .. } => ErrorCode::DonationMissing,
            DispatchError::MethodNotFound { .. } => ErrorCode::MethodNotFound,
            DispatchError::MethodNotImplemented { .. } => ErrorCode::MethodNotImplemented,
            DispatchError::MethodExecution { .. } => ErrorCode::MethodExecutionError,
        }
    }
}

/// What a bound handler method may fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("Missing entity '{0}'")]
    MissingEntity(String),

    #[error("Invalid entity '{entity}': {reason}")]
    InvalidEntity { entity: String, reason: String },

    #[error("Component unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Execution(String),
}
