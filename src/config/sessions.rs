//! Session configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::action::NotificationPreferences;
use crate::domain::conversation::MemoryManagement;

/// Longest retention age accepted, ten years.
pub const MAX_RETENTION_AGE_HOURS: u64 = 10 * 365 * 24;

/// Per-session defaults and the periodic cleanup cadence
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionsConfig {
    /// Language for sessions whose client does not send one
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Seconds between cleanup passes over all sessions
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Retention policies and memory alert threshold
    #[serde(default)]
    pub memory: MemoryManagement,

    /// Notification preferences given to new sessions
    #[serde(default)]
    pub notifications: NotificationPreferences,
}

impl SessionsConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_language.trim().is_empty() {
            return Err(ValidationError::MissingLanguage);
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ValidationError::InvalidCleanupInterval);
        }
        let policies = [
            ("conversation_history", &self.memory.conversation_history),
            ("recent_actions", &self.memory.recent_actions),
            ("failed_actions", &self.memory.failed_actions),
        ];
        for (name, policy) in policies {
            if policy.max_entries == 0 {
                return Err(ValidationError::InvalidRetention(name));
            }
            if policy.max_age_hours > MAX_RETENTION_AGE_HOURS {
                return Err(ValidationError::RetentionAgeTooLong(name));
            }
        }
        Ok(())
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            cleanup_interval_secs: default_cleanup_interval(),
            memory: MemoryManagement::default(),
            notifications: NotificationPreferences::default(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_cleanup_interval() -> u64 {
    1800
}
