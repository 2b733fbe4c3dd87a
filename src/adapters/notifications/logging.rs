//! Notifier that writes action notices to the log.

use async_trait::async_trait;

use crate::ports::{ActionNotification, ActionNotifier, NotificationKind};

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionNotifier for LoggingNotifier {
    async fn notify(&self, notification: ActionNotification) {
        let record = &notification.record;
        match notification.kind {
            NotificationKind::Completed => tracing::info!(
                session_id = %notification.session_id,
                domain = %record.domain,
                action = %record.action_name,
                action_id = %record.action_id,
                duration_secs = record.duration_secs(),
                delivery = ?notification.delivery_methods,
                "Action completed"
            ),
            NotificationKind::Failed => tracing::warn!(
                session_id = %notification.session_id,
                domain = %record.domain,
                action = %record.action_name,
                action_id = %record.action_id,
                error = record.error.as_deref().unwrap_or("unknown"),
                failure_type = record.failure_type.map(|t| t.as_str()).unwrap_or("unknown"),
                critical = record.is_critical.unwrap_or(false),
                delivery = ?notification.delivery_methods,
                "Action failed"
            ),
        }
    }
}
