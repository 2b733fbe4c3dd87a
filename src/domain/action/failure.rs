//! Failure classification for fire-and-forget actions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse category of an action failure, derived from its error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    Timeout,
    Network,
    Permission,
    NotFound,
    ServiceUnavailable,
    Cancelled,
    Runtime,
    Unknown,
}

/// Checked top to bottom; the first row with a matching needle wins.
const CLASSIFICATION_RULES: &[(FailureType, &[&str])] = &[
    (FailureType::Timeout, &["timeout", "timed out"]),
    (FailureType::Network, &["connection", "network"]),
    (FailureType::Permission, &["permission", "access"]),
    (FailureType::NotFound, &["not found", "404"]),
    (FailureType::ServiceUnavailable, &["unavailable", "service"]),
    (FailureType::Cancelled, &["cancelled", "canceled"]),
];

/// Error message fragments that make a single failure critical.
pub const CRITICAL_ERROR_KEYWORDS: &[&str] = &[
    "permission denied",
    "access denied",
    "authentication failed",
    "service unavailable",
    "critical error",
    "fatal error",
];

/// Failure count per domain at which every further failure is critical.
pub const CRITICAL_FAILURE_COUNT: u32 = 3;

impl FailureType {
    /// Classifies an error message, case-insensitively.
    ///
    /// A missing message is `Unknown`; a message matching no rule is `Runtime`.
    pub fn classify(error: Option<&str>) -> Self {
        let Some(error) = error else {
            return FailureType::Unknown;
        };
        let lowered = error.to_lowercase();
        CLASSIFICATION_RULES
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lowered.contains(n)))
            .map(|(kind, _)| *kind)
            .unwrap_or(FailureType::Runtime)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::Timeout => "timeout",
            FailureType::Network => "network",
            FailureType::Permission => "permission",
            FailureType::NotFound => "not_found",
            FailureType::ServiceUnavailable => "service_unavailable",
            FailureType::Cancelled => "cancelled",
            FailureType::Runtime => "runtime",
            FailureType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decides criticality from the post-increment error count and the message.
pub fn is_critical_failure(error_count: u32, error: Option<&str>) -> bool {
    if error_count >= CRITICAL_FAILURE_COUNT {
        return true;
    }
    error.is_some_and(|e| {
        let lowered = e.to_lowercase();
        CRITICAL_ERROR_KEYWORDS.iter().any(|k| lowered.contains(k))
    })
}
