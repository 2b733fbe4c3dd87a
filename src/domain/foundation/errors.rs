//! Error types for the domain layer.

use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction and state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Machine-readable error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Dispatch errors
    NoHandler,
    DonationMissing,
    MethodNotFound,
    MethodNotImplemented,
    MethodExecutionError,

    // Workflow errors
    WorkflowUnavailable,
    WorkflowNotFound,

    // Validation errors
    ValidationFailed,
}

impl ErrorCode {
    /// Stable snake_case form used in `IntentResult.error`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoHandler => "no_handler",
            ErrorCode::DonationMissing => "donation_missing",
            ErrorCode::MethodNotFound => "method_not_found",
            ErrorCode::MethodNotImplemented => "method_not_implemented",
            ErrorCode::MethodExecutionError => "method_execution_error",
            ErrorCode::WorkflowUnavailable => "workflow_unavailable",
            ErrorCode::WorkflowNotFound => "workflow_not_found",
            ErrorCode::ValidationFailed => "validation_failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
