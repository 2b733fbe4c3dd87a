//! Action bookkeeping on a conversation context.
//!
//! These are the synchronous mutations the action tracker performs when an
//! action starts, finishes, or is cancelled.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::ConversationContext;
use crate::domain::action::{is_critical_failure, ActionRecord, ActionStatus, FailureType};
use crate::domain::foundation::{ActionId, Timestamp};

/// Most recent finished actions kept per session.
pub const RECENT_ACTIONS_LIMIT: usize = 10;

/// Most recent failures kept per session.
pub const FAILED_ACTIONS_LIMIT: usize = 20;

/// Failures inspected by [`ConversationContext::has_critical_failures`].
const CRITICAL_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorSummary {
    pub total_failures: usize,
    pub critical_failures: usize,
    pub error_counts: BTreeMap<String, u32>,
    pub failure_types: BTreeMap<String, usize>,
}

impl ConversationContext {
    /// Registers a running action under its domain.
    ///
    /// Returns the record it replaced, if a previous action in the same domain
    /// was still active.
    pub fn begin_action(&mut self, record: ActionRecord) -> Option<ActionRecord> {
        let previous = self.active_actions.insert(record.domain.clone(), record);
        self.touch();
        previous
    }

    /// Finishes whatever action is active in `domain`.
    ///
    /// Returns the finished record (with failure details when it failed), or
    /// None if nothing was active.
    pub fn complete_action(
        &mut self,
        domain: &str,
        success: bool,
        error: Option<&str>,
    ) -> Option<ActionRecord> {
        let mut record = self.active_actions.remove(domain)?;
        let was_cancelled = record.status == ActionStatus::Cancelled;

        record.completed_at = Some(Timestamp::now());
        record.success = Some(success && !was_cancelled);
        record.error = error.map(str::to_string);
        record.status = if was_cancelled {
            ActionStatus::Cancelled
        } else if success {
            ActionStatus::Completed
        } else {
            ActionStatus::Failed
        };

        push_bounded(&mut self.recent_actions, record.clone(), RECENT_ACTIONS_LIMIT);

        if !success && !was_cancelled {
            let count = self.action_error_count.entry(domain.to_string()).or_insert(0);
            *count += 1;
            let mut failed = record.clone();
            failed.failure_type = Some(FailureType::classify(error));
            failed.is_critical = Some(is_critical_failure(*count, error));
            push_bounded(&mut self.failed_actions, failed.clone(), FAILED_ACTIONS_LIMIT);
            record = failed;
        }

        self.touch();
        Some(record)
    }

    /// Finishes the action only if `action_id` is still the active run for
    /// `domain`. A superseded run finishing late is a no-op.
    pub fn complete_action_run(
        &mut self,
        domain: &str,
        action_id: &ActionId,
        success: bool,
        error: Option<&str>,
    ) -> Option<ActionRecord> {
        match self.active_actions.get(domain) {
            Some(active) if active.action_id == *action_id => {
                self.complete_action(domain, success, error)
            }
            _ => None,
        }
    }

    /// Marks the active action in `domain` as cancelled.
    ///
    /// The record stays active until its task observes the cancellation and
    /// finishes. Returns false when nothing is active.
    pub fn cancel_action(&mut self, domain: &str, reason: &str) -> bool {
        match self.active_actions.get_mut(domain) {
            Some(record) => {
                record.status = ActionStatus::Cancelled;
                record.cancelled_at = Some(Timestamp::now());
                record.cancellation_reason = Some(reason.to_string());
                self.last_activity = Timestamp::now();
                true
            }
            None => false,
        }
    }

    pub fn update_action_status(&mut self, domain: &str, status: ActionStatus) -> bool {
        match self.active_actions.get_mut(domain) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    pub fn active_action(&self, domain: &str) -> Option<&ActionRecord> {
        self.active_actions.get(domain)
    }

    pub fn active_actions(&self) -> &HashMap<String, ActionRecord> {
        &self.active_actions
    }

    pub fn recent_actions(&self) -> &VecDeque<ActionRecord> {
        &self.recent_actions
    }

    /// The last `limit` failures, oldest first.
    pub fn failed_actions(&self, limit: usize) -> Vec<&ActionRecord> {
        let skip = self.failed_actions.len().saturating_sub(limit);
        self.failed_actions.iter().skip(skip).collect()
    }

    pub fn action_error_count(&self, domain: &str) -> u32 {
        self.action_error_count.get(domain).copied().unwrap_or(0)
    }

    /// Domains with a running action, sorted.
    pub fn cancellable_actions(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .active_actions
            .values()
            .filter(|r| r.is_running())
            .map(|r| r.domain.clone())
            .collect();
        domains.sort();
        domains
    }

    /// Distinct domains of recently finished actions, newest first.
    pub fn recent_action_domains(&self, limit: usize) -> Vec<String> {
        let mut domains: Vec<String> = Vec::new();
        for record in self.recent_actions.iter().rev() {
            if domains.len() >= limit {
                break;
            }
            if !domains.contains(&record.domain) {
                domains.push(record.domain.clone());
            }
        }
        domains
    }

    pub fn error_summary(&self) -> ErrorSummary {
        let mut failure_types = BTreeMap::new();
        for record in &self.failed_actions {
            let kind = record.failure_type.unwrap_or(FailureType::Unknown);
            *failure_types.entry(kind.as_str().to_string()).or_insert(0) += 1;
        }
        ErrorSummary {
            total_failures: self.failed_actions.len(),
            critical_failures: self
                .failed_actions
                .iter()
                .filter(|r| r.is_critical == Some(true))
                .count(),
            error_counts: self
                .action_error_count
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            failure_types,
        }
    }

    /// True if any of the last few failures was critical.
    pub fn has_critical_failures(&self) -> bool {
        self.failed_actions
            .iter()
            .rev()
            .take(CRITICAL_LOOKBACK)
            .any(|r| r.is_critical == Some(true))
    }
}

fn push_bounded(items: &mut VecDeque<ActionRecord>, record: ActionRecord, limit: usize) {
    items.push_back(record);
    while items.len() > limit {
        items.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SessionId;
    use proptest::prelude::*;

    fn ctx() -> ConversationContext {
        ConversationContext::new(SessionId::new("living_room").unwrap(), "en")
    }

    fn start(ctx: &mut ConversationContext, domain: &str) -> ActionId {
        let record = ActionRecord::started(domain, "run", "test_handler");
        let id = record.action_id;
        ctx.begin_action(record);
        id
    }

    mod lifecycle {
        use super::*;

        #[test]
        fn begin_registers_running_record() {
            let mut ctx = ctx();
            start(&mut ctx, "audio");
            assert!(ctx.active_action("audio").unwrap().is_running());
            assert_eq!(ctx.cancellable_actions(), vec!["audio".to_string()]);
        }

        #[test]
        fn begin_supersedes_previous_record() {
            let mut ctx = ctx();
            let first = start(&mut ctx, "audio");
            let replaced = ctx.begin_action(ActionRecord::started("audio", "run", "h"));
            assert_eq!(replaced.map(|r| r.action_id), Some(first));
            assert_eq!(ctx.active_actions().len(), 1);
        }

        #[test]
        fn success_moves_record_to_recent() {
            let mut ctx = ctx();
            start(&mut ctx, "audio");
            let done = ctx.complete_action("audio", true, None).unwrap();
            assert_eq!(done.status, ActionStatus::Completed);
            assert!(ctx.active_action("audio").is_none());
            assert_eq!(ctx.recent_actions().back().unwrap().success, Some(true));
            assert!(ctx.failed_actions(10).is_empty());
        }

        #[test]
        fn failure_is_classified_and_recorded() {
            let mut ctx = ctx();
            start(&mut ctx, "audio");
            let done = ctx
                .complete_action("audio", false, Some("connection refused"))
                .unwrap();
            assert_eq!(done.status, ActionStatus::Failed);
            assert!(ctx.active_action("audio").is_none());
            assert_eq!(ctx.recent_actions().back().unwrap().success, Some(false));
            let failed = ctx.failed_actions(1);
            assert_eq!(failed[0].failure_type, Some(FailureType::Network));
            assert_eq!(failed[0].is_critical, Some(false));
            assert_eq!(ctx.action_error_count("audio"), 1);
        }

        #[test]
        fn connection_timeout_classifies_as_timeout() {
            let mut ctx = ctx();
            start(&mut ctx, "audio");
            ctx.complete_action("audio", false, Some("connection timeout"));
            assert_eq!(ctx.failed_actions(1)[0].failure_type, Some(FailureType::Timeout));
        }

        #[test]
        fn third_failure_in_domain_is_critical() {
            let mut ctx = ctx();
            for _ in 0..2 {
                start(&mut ctx, "llm");
                ctx.complete_action("llm", false, Some("boom"));
            }
            assert_eq!(ctx.action_error_count("llm"), 2);
            assert!(!ctx.has_critical_failures());

            start(&mut ctx, "llm");
            let third = ctx.complete_action("llm", false, Some("boom")).unwrap();
            assert_eq!(third.is_critical, Some(true));
            assert!(ctx.has_critical_failures());
        }

        #[test]
        fn completing_missing_domain_returns_none() {
            assert!(ctx().complete_action("audio", true, None).is_none());
        }
    }

    mod superseding {
        use super::*;

        #[test]
        fn stale_run_completion_is_ignored() {
            let mut ctx = ctx();
            let old = start(&mut ctx, "audio");
            let new = start(&mut ctx, "audio");

            assert!(ctx.complete_action_run("audio", &old, false, Some("late")).is_none());
            assert_eq!(ctx.active_action("audio").unwrap().action_id, new);
            assert_eq!(ctx.recent_actions().len(), 0);

            assert!(ctx.complete_action_run("audio", &new, true, None).is_some());
            assert!(ctx.active_action("audio").is_none());
        }
    }

    mod cancellation {
        use super::*;

        #[test]
        fn cancel_without_active_action_is_noop() {
            let mut ctx = ctx();
            assert!(!ctx.cancel_action("audio", "user asked"));
            assert!(ctx.active_actions().is_empty());
            assert_eq!(ctx.recent_actions().len(), 0);
        }

        #[test]
        fn cancel_marks_record() {
            let mut ctx = ctx();
            start(&mut ctx, "audio");
            assert!(ctx.cancel_action("audio", "user asked"));
            let record = ctx.active_action("audio").unwrap();
            assert_eq!(record.status, ActionStatus::Cancelled);
            assert_eq!(record.cancellation_reason.as_deref(), Some("user asked"));
            assert!(record.cancelled_at.is_some());
            assert!(ctx.cancellable_actions().is_empty());
        }

        #[test]
        fn cancelled_run_finishing_is_not_a_failure() {
            let mut ctx = ctx();
            start(&mut ctx, "timer");
            ctx.cancel_action("timer", "stop");
            let done = ctx.complete_action("timer", false, Some("cancelled")).unwrap();
            assert_eq!(done.status, ActionStatus::Cancelled);
            assert!(ctx.failed_actions(10).is_empty());
            assert_eq!(ctx.action_error_count("timer"), 0);
        }
    }

    mod summaries {
        use super::*;

        #[test]
        fn recent_action_domains_are_distinct_newest_first() {
            let mut ctx = ctx();
            for domain in ["audio", "timer", "audio", "weather"] {
                start(&mut ctx, domain);
                ctx.complete_action(domain, true, None);
            }
            assert_eq!(ctx.recent_action_domains(2), vec!["weather", "audio"]);
        }

        #[test]
        fn error_summary_groups_by_type() {
            let mut ctx = ctx();
            start(&mut ctx, "audio");
            ctx.complete_action("audio", false, Some("timed out"));
            start(&mut ctx, "timer");
            ctx.complete_action("timer", false, Some("fatal error"));
            let summary = ctx.error_summary();
            assert_eq!(summary.total_failures, 2);
            assert_eq!(summary.critical_failures, 1);
            assert_eq!(summary.failure_types.get("timeout"), Some(&1));
            assert_eq!(summary.error_counts.get("timer"), Some(&1));
        }
    }

    proptest! {
        #[test]
        fn action_collections_stay_bounded(
            outcomes in proptest::collection::vec((0usize..4, any::<bool>()), 0..80)
        ) {
            let domains = ["audio", "timer", "llm", "weather"];
            let mut ctx = ctx();
            for (d, success) in outcomes {
                let domain = domains[d];
                start(&mut ctx, domain);
                let error = if success { None } else { Some("boom") };
                ctx.complete_action(domain, success, error);
                prop_assert!(ctx.recent_actions().len() <= RECENT_ACTIONS_LIMIT);
                prop_assert!(ctx.failed_actions(usize::MAX).len() <= FAILED_ACTIONS_LIMIT);
                prop_assert!(ctx.active_action(domain).is_none());
            }
        }
    }
}
