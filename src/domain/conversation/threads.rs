//! Per-domain message threads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;

use super::{ConversationContext, TurnRole};
use crate::domain::foundation::Timestamp;

/// Messages kept per domain thread.
pub const THREAD_MESSAGE_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub timestamp: Timestamp,
    pub role: TurnRole,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Running message history scoped to one topical domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainThread {
    pub messages: VecDeque<ThreadMessage>,
    pub context: Map<String, Value>,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
}

impl DomainThread {
    fn new() -> Self {
        let now = Timestamp::now();
        Self {
            messages: VecDeque::new(),
            context: Map::new(),
            created_at: now,
            last_activity: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadSummary {
    pub domain: String,
    pub message_count: usize,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
    pub last_message: Option<String>,
    pub context_keys: Vec<String>,
}

impl ConversationContext {
    pub fn add_to_thread(
        &mut self,
        domain: &str,
        role: TurnRole,
        content: impl Into<String>,
        metadata: Map<String, Value>,
    ) {
        let thread = self
            .domain_threads
            .entry(domain.to_string())
            .or_insert_with(DomainThread::new);
        let now = Timestamp::now();
        thread.messages.push_back(ThreadMessage {
            timestamp: now,
            role,
            content: content.into(),
            metadata,
        });
        while thread.messages.len() > THREAD_MESSAGE_LIMIT {
            thread.messages.pop_front();
        }
        thread.last_activity = now;
        self.touch();
    }

    /// The most recent `limit` messages, oldest first.
    pub fn thread_messages(&self, domain: &str, limit: usize) -> Vec<ThreadMessage> {
        match self.domain_threads.get(domain) {
            Some(thread) => {
                let skip = thread.messages.len().saturating_sub(limit);
                thread.messages.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Domains with at least one message newer than `since_secs` ago, sorted.
    pub fn active_threads(&self, since_secs: u64) -> Vec<String> {
        let cutoff = Timestamp::now().minus_secs(since_secs);
        let mut domains: Vec<String> = self
            .domain_threads
            .iter()
            .filter(|(_, thread)| thread.messages.iter().any(|m| m.timestamp.is_after(&cutoff)))
            .map(|(domain, _)| domain.clone())
            .collect();
        domains.sort();
        domains
    }

    pub fn has_thread(&self, domain: &str) -> bool {
        self.domain_threads.contains_key(domain)
    }

    pub fn thread_context(&self, domain: &str) -> Option<&Map<String, Value>> {
        self.domain_threads.get(domain).map(|t| &t.context)
    }

    pub fn update_thread_context(&mut self, domain: &str, key: impl Into<String>, value: impl Into<Value>) {
        let thread = self
            .domain_threads
            .entry(domain.to_string())
            .or_insert_with(DomainThread::new);
        thread.context.insert(key.into(), value.into());
        thread.last_activity = Timestamp::now();
    }

    /// Empties a thread's messages; the thread itself is removed unless its
    /// context is kept.
    pub fn clear_thread(&mut self, domain: &str, keep_context: bool) -> bool {
        if keep_context {
            match self.domain_threads.get_mut(domain) {
                Some(thread) => {
                    thread.messages.clear();
                    true
                }
                None => false,
            }
        } else {
            self.domain_threads.remove(domain).is_some()
        }
    }

    pub fn thread_summary(&self, domain: &str) -> Option<ThreadSummary> {
        self.domain_threads.get(domain).map(|thread| ThreadSummary {
            domain: domain.to_string(),
            message_count: thread.messages.len(),
            created_at: thread.created_at,
            last_activity: thread.last_activity,
            last_message: thread.messages.back().map(|m| m.content.clone()),
            context_keys: thread.context.keys().cloned().collect(),
        })
    }

    /// Summaries of every thread, most recently active first.
    pub fn threads_summary(&self) -> Vec<ThreadSummary> {
        let mut summaries: Vec<ThreadSummary> = self
            .domain_threads
            .keys()
            .filter_map(|domain| self.thread_summary(domain))
            .collect();
        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        summaries
    }
}
