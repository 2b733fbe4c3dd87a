//! SessionRegistry - owner of every live ConversationContext.
//!
//! Contexts are created on a session's first request and removed only on
//! explicit expiry. Each context sits behind an async mutex, which is the
//! serialization point for callers touching the same session.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time;

use crate::config::SessionsConfig;
use crate::domain::action::NotificationPreferences;
use crate::domain::conversation::{
    CleanupReport, ClientContext, ConversationContext, MemoryManagement,
};
use crate::domain::foundation::SessionId;

/// A session's context, shared between request handling and background actions.
pub type SharedContext = Arc<Mutex<ConversationContext>>;

/// Defaults applied to newly created contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub default_language: String,
    pub memory: MemoryManagement,
    pub notifications: NotificationPreferences,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            memory: MemoryManagement::default(),
            notifications: NotificationPreferences::default(),
        }
    }
}

impl From<&SessionsConfig> for SessionSettings {
    fn from(config: &SessionsConfig) -> Self {
        Self {
            default_language: config.default_language.clone(),
            memory: config.memory.clone(),
            notifications: config.notifications.clone(),
        }
    }
}

/// Aggregate result of one cleanup pass over all sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub sessions_checked: usize,
    pub sessions_cleaned: usize,
    pub memory_pressure_sessions: usize,
    pub removed: CleanupReport,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SharedContext>>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Returns the session's context, creating it from the client metadata on
    /// first use. Later calls fill in room/client details still unknown.
    pub async fn get_or_create(&self, session_id: &SessionId, client: &ClientContext) -> SharedContext {
        if let Some(existing) = self.get(session_id) {
            existing.lock().await.apply_client_context(client);
            return existing;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                tracing::info!(session_id = %session_id, room = ?client.room_id, "Created conversation context");
                let ctx = ConversationContext::from_client(
                    session_id.clone(),
                    client,
                    &self.settings.default_language,
                )
                .with_memory_management(self.settings.memory.clone())
                .with_notification_preferences(self.settings.notifications.clone());
                Arc::new(Mutex::new(ctx))
            })
            .clone()
    }

    pub fn get(&self, session_id: &SessionId) -> Option<SharedContext> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }

    /// Expires a session. Background actions still holding the context keep
    /// it alive until they finish.
    pub fn remove(&self, session_id: &SessionId) -> bool {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id)
            .is_some();
        if removed {
            tracing::info!(session_id = %session_id, "Removed conversation context");
        }
        removed
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cleans every context that asks for it, or every context when
    /// `aggressive`. Memory pressure forces an aggressive cleanup of that
    /// context.
    pub async fn cleanup_all(&self, aggressive: bool) -> CleanupStats {
        let contexts: Vec<SharedContext> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut stats = CleanupStats::default();
        for shared in contexts {
            let mut ctx = shared.lock().await;
            stats.sessions_checked += 1;
            let trigger = ctx.should_trigger_cleanup();
            if trigger.memory_pressure {
                stats.memory_pressure_sessions += 1;
                tracing::warn!(session_id = %ctx.session_id(), "Conversation context over memory alert threshold");
            }
            if aggressive || trigger.is_needed() {
                let report = ctx.perform_cleanup(aggressive || trigger.memory_pressure);
                if report.total() > 0 {
                    stats.sessions_cleaned += 1;
                }
                stats.removed.absorb(report);
            }
        }
        stats
    }

    /// Runs `cleanup_all` on an interval until shutdown is signalled.
    pub async fn run_cleanup_loop(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(interval);
        // The first tick completes immediately; skip it so cleanup starts one interval in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Session cleanup loop stopped");
                        return;
                    }
                }

                _ = ticker.tick() => {
                    let stats = self.cleanup_all(false).await;
                    tracing::debug!(
                        checked = stats.sessions_checked,
                        cleaned = stats.sessions_cleaned,
                        removed = stats.removed.total(),
                        "Periodic session cleanup finished"
                    );
                }
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> SessionId {
        SessionId::new(name).unwrap()
    }

    mod lifecycle {
        use super::*;

        #[tokio::test]
        async fn first_request_creates_context_with_room() {
            let registry = SessionRegistry::default();
            let ctx = registry
                .get_or_create(&session("kitchen_session"), &ClientContext::for_room("kitchen", "Kitchen"))
                .await;
            assert_eq!(ctx.lock().await.room_name(), Some("Kitchen"));
            assert_eq!(registry.len(), 1);
        }

        #[tokio::test]
        async fn same_session_returns_same_context() {
            let registry = SessionRegistry::default();
            let a = registry.get_or_create(&session("s"), &ClientContext::default()).await;
            let b = registry.get_or_create(&session("s"), &ClientContext::default()).await;
            assert!(Arc::ptr_eq(&a, &b));
        }

        #[tokio::test]
        async fn settings_apply_to_new_contexts() {
            let mut settings = SessionSettings::default();
            settings.default_language = "ru".to_string();
            settings.notifications.failure.critical_only = false;
            let registry = SessionRegistry::new(settings);
            let ctx = registry.get_or_create(&session("s"), &ClientContext::default()).await;
            let ctx = ctx.lock().await;
            assert_eq!(ctx.language(), "ru");
            assert!(!ctx.notification_preferences().failure.critical_only);
        }

        #[tokio::test]
        async fn remove_only_on_request() {
            let registry = SessionRegistry::default();
            registry.get_or_create(&session("s"), &ClientContext::default()).await;
            assert!(registry.remove(&session("s")));
            assert!(!registry.remove(&session("s")));
            assert!(registry.is_empty());
        }
    }

    mod cleanup {
        use super::*;

        #[tokio::test]
        async fn cleans_only_contexts_over_threshold() {
            let registry = SessionRegistry::default();
            let busy = registry.get_or_create(&session("busy"), &ClientContext::default()).await;
            registry.get_or_create(&session("quiet"), &ClientContext::default()).await;
            {
                let mut ctx = busy.lock().await;
                for n in 0..70 {
                    ctx.add_to_history(format!("q{}", n), "a", None);
                }
            }

            let stats = registry.cleanup_all(false).await;
            assert_eq!(stats.sessions_checked, 2);
            assert_eq!(stats.sessions_cleaned, 1);
            assert_eq!(stats.removed.history_removed, 20);
            assert_eq!(busy.lock().await.conversation_history().len(), 50);
        }

        #[tokio::test]
        async fn aggressive_cleanup_halves_every_context() {
            let registry = SessionRegistry::default();
            let ctx = registry.get_or_create(&session("s"), &ClientContext::default()).await;
            {
                let mut ctx = ctx.lock().await;
                for n in 0..40 {
                    ctx.add_to_history(format!("q{}", n), "a", None);
                }
            }
            registry.cleanup_all(true).await;
            assert_eq!(ctx.lock().await.conversation_history().len(), 25);
        }

        #[tokio::test(start_paused = true)]
        async fn cleanup_loop_stops_on_shutdown() {
            let registry = Arc::new(SessionRegistry::default());
            let (tx, rx) = watch::channel(false);
            let loop_registry = Arc::clone(&registry);
            let handle = tokio::spawn(async move {
                loop_registry.run_cleanup_loop(Duration::from_secs(60), rx).await;
            });

            time::sleep(Duration::from_secs(150)).await;
            tx.send(true).unwrap();
            handle.await.unwrap();
        }
    }
}
