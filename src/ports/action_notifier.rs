//! Action Notifier Port - delivery of action completion/failure notices.
//!
//! The tracker only decides eligibility (via the session's notification
//! preferences); how a notice reaches the user is the adapter's business.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::action::ActionRecord;
use crate::domain::foundation::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Completed,
    Failed,
}

/// A notice about one finished action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionNotification {
    pub session_id: SessionId,
    pub kind: NotificationKind,
    pub record: ActionRecord,
    pub delivery_methods: Vec<String>,
}

#[async_trait]
pub trait ActionNotifier: Send + Sync {
    /// Delivers a notice. Delivery failures are the notifier's to log.
    async fn notify(&self, notification: ActionNotification);
}
