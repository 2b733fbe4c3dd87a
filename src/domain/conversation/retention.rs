//! Retention policy and cleanup for a conversation context.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::ConversationContext;
use crate::domain::foundation::Timestamp;

/// Limits for one tracked collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub max_entries: usize,
    pub max_age_hours: u64,
    /// Extra entries tolerated above `max_entries` before cleanup is flagged.
    #[serde(default)]
    pub cleanup_threshold: usize,
}

impl RetentionPolicy {
    pub const fn new(max_entries: usize, max_age_hours: u64, cleanup_threshold: usize) -> Self {
        Self {
            max_entries,
            max_age_hours,
            cleanup_threshold,
        }
    }

    pub fn is_over_threshold(&self, len: usize) -> bool {
        len > self.max_entries + self.cleanup_threshold
    }
}

fn default_history_policy() -> RetentionPolicy {
    RetentionPolicy::new(50, 24, 10)
}

fn default_recent_policy() -> RetentionPolicy {
    RetentionPolicy::new(10, 6, 0)
}

fn default_failed_policy() -> RetentionPolicy {
    RetentionPolicy::new(20, 48, 0)
}

fn default_alert_threshold_bytes() -> usize {
    100 * 1024 * 1024
}

/// Retention configuration for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryManagement {
    #[serde(default = "default_history_policy")]
    pub conversation_history: RetentionPolicy,
    #[serde(default = "default_recent_policy")]
    pub recent_actions: RetentionPolicy,
    #[serde(default = "default_failed_policy")]
    pub failed_actions: RetentionPolicy,
    #[serde(default = "default_alert_threshold_bytes")]
    pub memory_alert_threshold_bytes: usize,
}

impl Default for MemoryManagement {
    fn default() -> Self {
        Self {
            conversation_history: default_history_policy(),
            recent_actions: default_recent_policy(),
            failed_actions: default_failed_policy(),
            memory_alert_threshold_bytes: default_alert_threshold_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedCollection {
    ConversationHistory,
    RecentActions,
    FailedActions,
}

/// Why a context wants cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupTrigger {
    pub collections: Vec<TrackedCollection>,
    pub memory_pressure: bool,
}

impl CleanupTrigger {
    pub fn is_needed(&self) -> bool {
        self.memory_pressure || !self.collections.is_empty()
    }
}

/// Number of entries removed from each collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub history_removed: usize,
    pub recent_actions_removed: usize,
    pub failed_actions_removed: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.history_removed + self.recent_actions_removed + self.failed_actions_removed
    }

    pub fn absorb(&mut self, other: CleanupReport) {
        self.history_removed += other.history_removed;
        self.recent_actions_removed += other.recent_actions_removed;
        self.failed_actions_removed += other.failed_actions_removed;
    }
}

/// Entry counts and serialized sizes of a context's collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryUsage {
    pub history_entries: usize,
    pub history_bytes: usize,
    pub active_actions: usize,
    pub recent_actions: usize,
    pub recent_actions_bytes: usize,
    pub failed_actions: usize,
    pub failed_actions_bytes: usize,
    pub threads: usize,
    pub thread_messages: usize,
    pub thread_bytes: usize,
    pub handler_contexts: usize,
    pub total_bytes: usize,
}

/// Drops entries older than the policy's age, then trims to its count,
/// keeping the newest. Returns how many entries were removed.
pub(crate) fn apply_retention<T>(
    items: &mut VecDeque<T>,
    policy: &RetentionPolicy,
    aggressive: bool,
    now: Timestamp,
    timestamp_of: impl Fn(&T) -> Timestamp,
) -> usize {
    let before = items.len();
    let cutoff = now.minus_hours(policy.max_age_hours);
    items.retain(|item| !timestamp_of(item).is_before(&cutoff));

    let limit = if aggressive {
        policy.max_entries / 2
    } else {
        policy.max_entries
    };
    while items.len() > limit {
        items.pop_front();
    }
    before - items.len()
}

pub(crate) fn serialized_len<T: Serialize>(value: &T) -> usize {
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}

impl ConversationContext {
    /// Reports which collections have outgrown their policy, and whether the
    /// estimated size crossed the alert threshold.
    pub fn should_trigger_cleanup(&self) -> CleanupTrigger {
        let policy = &self.memory_management;
        let mut collections = Vec::new();
        if policy
            .conversation_history
            .is_over_threshold(self.conversation_history.len())
        {
            collections.push(TrackedCollection::ConversationHistory);
        }
        if policy.recent_actions.is_over_threshold(self.recent_actions.len()) {
            collections.push(TrackedCollection::RecentActions);
        }
        if policy.failed_actions.is_over_threshold(self.failed_actions.len()) {
            collections.push(TrackedCollection::FailedActions);
        }
        let memory_pressure =
            self.memory_usage_estimate().total_bytes > policy.memory_alert_threshold_bytes;
        CleanupTrigger {
            collections,
            memory_pressure,
        }
    }

    /// Applies every collection's retention policy.
    ///
    /// Running it again without new data removes nothing more.
    pub fn perform_cleanup(&mut self, aggressive: bool) -> CleanupReport {
        let now = Timestamp::now();
        let policy = self.memory_management.clone();
        let report = CleanupReport {
            history_removed: apply_retention(
                &mut self.conversation_history,
                &policy.conversation_history,
                aggressive,
                now,
                |entry| entry.timestamp,
            ),
            recent_actions_removed: apply_retention(
                &mut self.recent_actions,
                &policy.recent_actions,
                aggressive,
                now,
                |record| record.last_update(),
            ),
            failed_actions_removed: apply_retention(
                &mut self.failed_actions,
                &policy.failed_actions,
                aggressive,
                now,
                |record| record.last_update(),
            ),
        };
        if report.total() > 0 {
            tracing::debug!(
                session_id = %self.session_id,
                removed = report.total(),
                aggressive,
                "Conversation context cleaned up"
            );
        }
        report
    }

    pub fn memory_usage_estimate(&self) -> MemoryUsage {
        let history_bytes: usize = self.conversation_history.iter().map(serialized_len).sum();
        let recent_actions_bytes: usize = self.recent_actions.iter().map(serialized_len).sum();
        let failed_actions_bytes: usize = self.failed_actions.iter().map(serialized_len).sum();
        let thread_bytes: usize = self.domain_threads.values().map(serialized_len).sum();
        let handler_bytes: usize = self.handler_contexts.values().map(serialized_len).sum();
        let active_bytes: usize = self.active_actions.values().map(serialized_len).sum();
        MemoryUsage {
            history_entries: self.conversation_history.len(),
            history_bytes,
            active_actions: self.active_actions.len(),
            recent_actions: self.recent_actions.len(),
            recent_actions_bytes,
            failed_actions: self.failed_actions.len(),
            failed_actions_bytes,
            threads: self.domain_threads.len(),
            thread_messages: self.domain_threads.values().map(|t| t.messages.len()).sum(),
            thread_bytes,
            handler_contexts: self.handler_contexts.len(),
            total_bytes: history_bytes
                + recent_actions_bytes
                + failed_actions_bytes
                + thread_bytes
                + handler_bytes
                + active_bytes,
        }
    }
}
