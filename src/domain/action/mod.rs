//! Action module - fire-and-forget action records and policies.

mod failure;
mod notification;
mod record;

pub use failure::{is_critical_failure, FailureType, CRITICAL_ERROR_KEYWORDS, CRITICAL_FAILURE_COUNT};
pub use notification::{CompletionNotifications, FailureNotifications, NotificationPreferences};
pub use record::{ActionRecord, ActionStatus};
