//! ConversationContext - per-session conversational state.
//!
//! One context exists per session (usually one per room). It holds dialogue
//! history, handler-private sub-state, per-domain threads, the action
//! bookkeeping written by the action tracker, and the conversation state
//! machine. Action, thread, layer and retention operations live in sibling
//! modules as further `impl` blocks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};

use super::{
    ClientContext, ConversationState, DomainThread, MemoryManagement, StateChange,
};
use crate::domain::action::{ActionRecord, NotificationPreferences};
use crate::domain::foundation::{SessionId, StateMachine, Timestamp, ValidationError};
use crate::domain::intent::Intent;

/// Hard cap on history entries, independent of retention policy.
pub const HISTORY_HARD_LIMIT: usize = 100;

/// History entries copied into a freshly created conversation handler context.
pub const HANDLER_CONTEXT_SEED_TURNS: usize = 10;

/// Handler whose context is seeded from history.
pub const CONVERSATION_HANDLER: &str = "conversation";

/// One user/assistant exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: Timestamp,
    pub user_text: String,
    pub response: String,
    pub intent: Option<String>,
    pub domain: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: Timestamp,
}

impl DialogueTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Timestamp::now(),
        }
    }
}

/// Private sub-state of one handler within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerContext {
    pub turns: Vec<DialogueTurn>,
    pub data: Map<String, Value>,
    pub created_at: Timestamp,
}

impl HandlerContext {
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            data: Map::new(),
            created_at: Timestamp::now(),
        }
    }

    pub fn push_turn(&mut self, role: TurnRole, content: impl Into<String>) {
        self.turns.push(DialogueTurn::new(role, content));
    }
}

impl Default for HandlerContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the conversation state machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub state: ConversationState,
    pub seconds_in_state: f64,
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub(super) session_id: SessionId,
    pub(super) room_id: Option<String>,
    pub(super) room_name: Option<String>,
    pub(super) client_id: Option<String>,
    pub(super) device_id: Option<String>,
    pub(super) language: String,
    pub(super) conversation_history: VecDeque<HistoryEntry>,
    pub(super) active_actions: HashMap<String, ActionRecord>,
    pub(super) recent_actions: VecDeque<ActionRecord>,
    pub(super) failed_actions: VecDeque<ActionRecord>,
    pub(super) action_error_count: HashMap<String, u32>,
    pub(super) handler_contexts: HashMap<String, HandlerContext>,
    pub(super) domain_threads: HashMap<String, DomainThread>,
    pub(super) conversation_state: ConversationState,
    pub(super) state_entered_at: Timestamp,
    pub(super) state_context: Map<String, Value>,
    pub(super) notification_preferences: NotificationPreferences,
    pub(super) memory_management: MemoryManagement,
    pub(super) created_at: Timestamp,
    pub(super) last_activity: Timestamp,
}

impl ConversationContext {
    pub fn new(session_id: SessionId, language: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            session_id,
            room_id: None,
            room_name: None,
            client_id: None,
            device_id: None,
            language: language.into(),
            conversation_history: VecDeque::new(),
            active_actions: HashMap::new(),
            recent_actions: VecDeque::new(),
            failed_actions: VecDeque::new(),
            action_error_count: HashMap::new(),
            handler_contexts: HashMap::new(),
            domain_threads: HashMap::new(),
            conversation_state: ConversationState::Idle,
            state_entered_at: now,
            state_context: Map::new(),
            notification_preferences: NotificationPreferences::default(),
            memory_management: MemoryManagement::default(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Creates a context populated from the first request's client metadata.
    pub fn from_client(
        session_id: SessionId,
        client: &ClientContext,
        default_language: &str,
    ) -> Self {
        let language = client
            .language
            .clone()
            .unwrap_or_else(|| default_language.to_string());
        let mut ctx = Self::new(session_id, language);
        ctx.apply_client_context(client);
        ctx
    }

    /// Fills in room/client metadata the context does not know yet.
    pub fn apply_client_context(&mut self, client: &ClientContext) {
        if self.room_id.is_none() {
            self.room_id = client.room_id.clone();
        }
        if self.room_name.is_none() {
            self.room_name = client.room_name.clone();
        }
        if client.client_id.is_some() {
            self.client_id = client.client_id.clone();
        }
        if client.device_id.is_some() {
            self.device_id = client.device_id.clone();
        }
    }

    pub fn with_notification_preferences(mut self, prefs: NotificationPreferences) -> Self {
        self.notification_preferences = prefs;
        self
    }

    pub fn with_memory_management(mut self, memory: MemoryManagement) -> Self {
        self.memory_management = memory;
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn room_name(&self) -> Option<&str> {
        self.room_name.as_deref()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn last_activity(&self) -> Timestamp {
        self.last_activity
    }

    pub fn notification_preferences(&self) -> &NotificationPreferences {
        &self.notification_preferences
    }

    pub fn memory_management(&self) -> &MemoryManagement {
        &self.memory_management
    }

    pub(super) fn touch(&mut self) {
        self.last_activity = Timestamp::now();
    }

    // === History ===

    /// Appends one exchange; the oldest entries fall off past the hard cap.
    pub fn add_to_history(
        &mut self,
        user_text: impl Into<String>,
        response: impl Into<String>,
        intent: Option<&Intent>,
    ) {
        self.conversation_history.push_back(HistoryEntry {
            timestamp: Timestamp::now(),
            user_text: user_text.into(),
            response: response.into(),
            intent: intent.map(|i| i.name().to_string()),
            domain: intent.map(|i| i.domain().to_string()),
            confidence: intent.map(|i| i.confidence()),
        });
        while self.conversation_history.len() > HISTORY_HARD_LIMIT {
            self.conversation_history.pop_front();
        }
        self.touch();
    }

    pub fn conversation_history(&self) -> &VecDeque<HistoryEntry> {
        &self.conversation_history
    }

    /// Intent names of the last `limit` exchanges, oldest first.
    pub fn recent_intents(&self, limit: usize) -> Vec<String> {
        let intents: Vec<String> = self
            .conversation_history
            .iter()
            .filter_map(|entry| entry.intent.clone())
            .collect();
        let skip = intents.len().saturating_sub(limit);
        intents.into_iter().skip(skip).collect()
    }

    // === Handler contexts ===

    /// Returns a handler's sub-state, creating it on first access.
    ///
    /// A new `conversation` handler context starts with the last few history
    /// exchanges as dialogue turns.
    pub fn handler_context(&mut self, handler: &str) -> &mut HandlerContext {
        if !self.handler_contexts.contains_key(handler) {
            let mut created = HandlerContext::new();
            if handler == CONVERSATION_HANDLER {
                let skip = self
                    .conversation_history
                    .len()
                    .saturating_sub(HANDLER_CONTEXT_SEED_TURNS);
                for entry in self.conversation_history.iter().skip(skip) {
                    created.push_turn(TurnRole::User, entry.user_text.clone());
                    created.push_turn(TurnRole::Assistant, entry.response.clone());
                }
            }
            self.handler_contexts.insert(handler.to_string(), created);
        }
        self.handler_contexts
            .entry(handler.to_string())
            .or_default()
    }

    pub fn existing_handler_context(&self, handler: &str) -> Option<&HandlerContext> {
        self.handler_contexts.get(handler)
    }

    /// Drops a handler's dialogue turns, optionally keeping system turns.
    pub fn clear_handler_context(&mut self, handler: &str, keep_system: bool) -> bool {
        match self.handler_contexts.get_mut(handler) {
            Some(ctx) => {
                if keep_system {
                    ctx.turns.retain(|t| t.role == TurnRole::System);
                } else {
                    ctx.turns.clear();
                }
                ctx.data.clear();
                true
            }
            None => false,
        }
    }

    // === Conversation state ===

    pub fn conversation_state(&self) -> ConversationState {
        self.conversation_state
    }

    /// Offers an intent to the state machine.
    ///
    /// A transition the machine forbids leaves the state untouched and is
    /// reported as `Rejected` and logged.
    pub fn apply_intent_transition(&mut self, intent: &Intent) -> StateChange {
        let current = self.conversation_state;
        let Some(target) = current.target_for_intent(intent) else {
            return StateChange::Unchanged(current);
        };
        match self.transition_state(target, Some(intent.name())) {
            Ok(change) => change,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    intent = intent.name(),
                    from = %current,
                    to = %target,
                    "Rejected conversation state transition: {}",
                    e
                );
                StateChange::Rejected {
                    current,
                    attempted: target,
                }
            }
        }
    }

    /// Moves the state machine to `target` if the edge is allowed.
    ///
    /// Targeting the current state is a no-op, not an error.
    pub fn transition_state(
        &mut self,
        target: ConversationState,
        trigger: Option<&str>,
    ) -> Result<StateChange, ValidationError> {
        let current = self.conversation_state;
        if current == target {
            return Ok(StateChange::Unchanged(current));
        }
        let next = current.transition_to(target)?;
        self.conversation_state = next;
        self.state_entered_at = Timestamp::now();
        self.state_context.clear();
        self.state_context.insert(
            "previous_state".to_string(),
            Value::String(current.as_str().to_string()),
        );
        if let Some(trigger) = trigger {
            self.state_context
                .insert("trigger".to_string(), Value::String(trigger.to_string()));
        }
        tracing::debug!(
            session_id = %self.session_id,
            from = %current,
            to = %next,
            "Conversation state changed"
        );
        self.touch();
        Ok(StateChange::Transitioned {
            from: current,
            to: next,
        })
    }

    pub fn set_state_context(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.state_context.insert(key.into(), value.into());
    }

    pub fn state_summary(&self) -> StateSummary {
        StateSummary {
            state: self.conversation_state,
            seconds_in_state: self.state_entered_at.elapsed_secs(),
            context: self.state_context.clone(),
        }
    }
}
