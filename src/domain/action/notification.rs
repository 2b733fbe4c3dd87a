//! Notification eligibility rules for finished actions.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_long_running_threshold() -> f64 {
    30.0
}

fn default_delivery_methods() -> Vec<String> {
    vec!["tts".to_string(), "log".to_string()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionNotifications {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum run time, in seconds, before a completion is announced.
    #[serde(default = "default_long_running_threshold")]
    pub long_running_threshold: f64,
}

impl Default for CompletionNotifications {
    fn default() -> Self {
        Self {
            enabled: true,
            long_running_threshold: default_long_running_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureNotifications {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub critical_only: bool,
}

impl Default for FailureNotifications {
    fn default() -> Self {
        Self {
            enabled: true,
            critical_only: true,
        }
    }
}

/// Per-session preferences consulted before notifying about an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default)]
    pub completion: CompletionNotifications,
    #[serde(default)]
    pub failure: FailureNotifications,
    #[serde(default = "default_delivery_methods")]
    pub delivery_methods: Vec<String>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            completion: CompletionNotifications::default(),
            failure: FailureNotifications::default(),
            delivery_methods: default_delivery_methods(),
        }
    }
}

impl NotificationPreferences {
    pub fn should_notify_completion(&self, _domain: &str, duration_secs: f64) -> bool {
        self.completion.enabled && duration_secs >= self.completion.long_running_threshold
    }

    pub fn should_notify_failure(&self, _domain: &str, _error: Option<&str>, is_critical: bool) -> bool {
        self.failure.enabled && (!self.failure.critical_only || is_critical)
    }
}
