//! ActionTracker - runs fire-and-forget handler work as background tasks.
//!
//! Each running action owns a cancellation token keyed by (session, domain).
//! Starting a new action in a domain replaces the handle, so a superseded
//! task finishing late finds neither its handle nor its record and changes
//! nothing.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::sessions::SharedContext;
use crate::domain::action::{ActionRecord, ActionStatus};
use crate::domain::foundation::{ActionId, SessionId};
use crate::ports::{ActionNotification, ActionNotifier, NotificationKind};

type HandleKey = (SessionId, String);

#[derive(Debug, Clone)]
struct ActionHandle {
    action_id: ActionId,
    token: CancellationToken,
}

/// What the caller gets back immediately after starting an action.
#[derive(Debug)]
pub struct StartedAction {
    pub action_id: ActionId,
    /// `{"active_actions": {domain: {...}}}`, ready to merge into an IntentResult.
    pub metadata: Map<String, Value>,
    pub join: JoinHandle<()>,
}

pub struct ActionTracker {
    handles: Arc<Mutex<HashMap<HandleKey, ActionHandle>>>,
    notifier: Option<Arc<dyn ActionNotifier>>,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self {
            handles: Arc::new(Mutex::new(HashMap::new())),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ActionNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Registers a running action under `domain` and spawns `work`.
    ///
    /// Returns as soon as the record is in place. The task completes the
    /// record when `work` resolves; errors and panics are captured there and
    /// never reach the caller.
    pub async fn start_action<F, Fut, T, E>(
        &self,
        ctx: &SharedContext,
        handler: &str,
        domain: &str,
        action_name: &str,
        work: F,
    ) -> StartedAction
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Display + Send + 'static,
    {
        let record = ActionRecord::started(domain, action_name, handler);
        let action_id = record.action_id;
        let action_meta = record.to_action_metadata();

        let session_id = {
            let mut guard = ctx.lock().await;
            if let Some(previous) = guard.begin_action(record) {
                tracing::info!(
                    session_id = %guard.session_id(),
                    domain,
                    superseded = %previous.action_id,
                    "Superseding running action"
                );
            }
            guard.session_id().clone()
        };

        let token = CancellationToken::new();
        // Replacing the handle invalidates the superseded run without cancelling it.
        self.lock_handles().insert(
            (session_id.clone(), domain.to_string()),
            ActionHandle {
                action_id,
                token: token.clone(),
            },
        );

        tracing::info!(session_id = %session_id, domain, action = action_name, action_id = %action_id, "Action started");

        let future = work(token);
        let completion = Completion {
            ctx: Arc::clone(ctx),
            handles: Arc::clone(&self.handles),
            notifier: self.notifier.clone(),
            session_id,
            domain: domain.to_string(),
            action_id,
        };
        let join = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(future).catch_unwind().await;
            let (success, error) = match outcome {
                Ok(Ok(_)) => (true, None),
                Ok(Err(err)) => (false, Some(err.to_string())),
                Err(panic) => (false, Some(panic_message(panic.as_ref()))),
            };
            completion.finish(success, error).await;
        });

        let mut active = Map::new();
        active.insert(domain.to_string(), action_meta);
        let mut metadata = Map::new();
        metadata.insert("active_actions".to_string(), Value::Object(active));

        StartedAction {
            action_id,
            metadata,
            join,
        }
    }

    /// Marks the domain's active action cancelled and signals its task.
    ///
    /// Returns false when nothing is active in `domain`.
    pub async fn cancel_action(&self, ctx: &SharedContext, domain: &str, reason: &str) -> bool {
        let (cancelled, session_id) = {
            let mut guard = ctx.lock().await;
            (guard.cancel_action(domain, reason), guard.session_id().clone())
        };
        if !cancelled {
            return false;
        }

        let key = (session_id.clone(), domain.to_string());
        if let Some(handle) = self.lock_handles().get(&key) {
            handle.token.cancel();
        }
        tracing::info!(session_id = %session_id, domain, reason, "Action cancellation requested");
        true
    }

    pub fn running_count(&self) -> usize {
        self.lock_handles().len()
    }

    /// Signals cancellation to every tracked action.
    pub fn shutdown(&self) {
        let mut handles = self.lock_handles();
        for handle in handles.values() {
            handle.token.cancel();
        }
        if !handles.is_empty() {
            tracing::info!(count = handles.len(), "Cancelled running actions on shutdown");
        }
        handles.clear();
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, HashMap<HandleKey, ActionHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ActionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the spawned task needs to complete its record.
struct Completion {
    ctx: SharedContext,
    handles: Arc<Mutex<HashMap<HandleKey, ActionHandle>>>,
    notifier: Option<Arc<dyn ActionNotifier>>,
    session_id: SessionId,
    domain: String,
    action_id: ActionId,
}

impl Completion {
    async fn finish(self, success: bool, error: Option<String>) {
        let (finished, prefs) = {
            let mut guard = self.ctx.lock().await;
            let finished =
                guard.complete_action_run(&self.domain, &self.action_id, success, error.as_deref());
            (finished, guard.notification_preferences().clone())
        };

        {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            let key = (self.session_id.clone(), self.domain.clone());
            if handles.get(&key).map(|h| h.action_id) == Some(self.action_id) {
                handles.remove(&key);
            }
        }

        let Some(record) = finished else {
            tracing::debug!(
                session_id = %self.session_id,
                domain = %self.domain,
                action_id = %self.action_id,
                "Superseded action finished; ignoring"
            );
            return;
        };

        let kind = match record.status {
            ActionStatus::Completed => {
                tracing::info!(
                    session_id = %self.session_id,
                    domain = %self.domain,
                    action_id = %self.action_id,
                    duration_secs = record.duration_secs(),
                    "Action completed"
                );
                prefs
                    .should_notify_completion(&self.domain, record.duration_secs())
                    .then_some(NotificationKind::Completed)
            }
            ActionStatus::Failed => {
                tracing::warn!(
                    session_id = %self.session_id,
                    domain = %self.domain,
                    action_id = %self.action_id,
                    error = record.error.as_deref().unwrap_or_default(),
                    failure_type = record.failure_type.map(|f| f.as_str()).unwrap_or_default(),
                    critical = record.is_critical.unwrap_or(false),
                    "Action failed"
                );
                prefs
                    .should_notify_failure(
                        &self.domain,
                        record.error.as_deref(),
                        record.is_critical.unwrap_or(false),
                    )
                    .then_some(NotificationKind::Failed)
            }
            ActionStatus::Cancelled | ActionStatus::Running => {
                tracing::info!(
                    session_id = %self.session_id,
                    domain = %self.domain,
                    action_id = %self.action_id,
                    "Cancelled action finished"
                );
                None
            }
        };

        if let (Some(kind), Some(notifier)) = (kind, self.notifier.as_ref()) {
            notifier
                .notify(ActionNotification {
                    session_id: self.session_id.clone(),
                    kind,
                    record,
                    delivery_methods: prefs.delivery_methods.clone(),
                })
                .await;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic: runtime error".to_string()
    }
}
