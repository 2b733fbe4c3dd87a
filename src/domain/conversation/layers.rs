//! Layered context resolution.
//!
//! Each layer is summarized independently into a JSON object so downstream
//! consumers (prompt builders, handlers) can pick what they need.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use super::ConversationContext;
use crate::domain::action::ActionRecord;

const THREAD_LAYER_MESSAGES: usize = 5;
const ACTION_LAYER_RECENT: usize = 5;
const ACTION_LAYER_FAILED: usize = 3;
const INTENT_LAYER_TURNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextLayer {
    /// Room, client and device metadata.
    Session,
    /// Active and recently finished actions.
    Action,
    /// Per-domain message history.
    Thread,
    /// Recent turns and transient conversation state.
    Intent,
}

impl ContextLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextLayer::Session => "session",
            ContextLayer::Action => "action",
            ContextLayer::Thread => "thread",
            ContextLayer::Intent => "intent",
        }
    }
}

impl fmt::Display for ContextLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ConversationContext {
    /// Resolves the requested layers in the order given. A layer requested
    /// more than once appears only at its first position.
    pub fn resolve_layered_context(
        &self,
        layers: &[ContextLayer],
        domain: Option<&str>,
    ) -> Vec<(ContextLayer, Value)> {
        let mut resolved: Vec<(ContextLayer, Value)> = Vec::with_capacity(layers.len());
        for layer in layers {
            if resolved.iter().any(|(seen, _)| seen == layer) {
                continue;
            }
            resolved.push((*layer, self.resolve_layer(*layer, domain)));
        }
        resolved
    }

    /// Default layer ordering: thread-first when the domain has a thread,
    /// intent-first otherwise.
    pub fn default_priority_layers(&self, domain: Option<&str>) -> Vec<ContextLayer> {
        match domain {
            Some(d) if self.has_thread(d) => vec![
                ContextLayer::Thread,
                ContextLayer::Action,
                ContextLayer::Intent,
                ContextLayer::Session,
            ],
            _ => vec![ContextLayer::Intent, ContextLayer::Action, ContextLayer::Session],
        }
    }

    /// The first `max_layers` default-priority layers, resolved.
    pub fn contextual_summary(
        &self,
        domain: Option<&str>,
        max_layers: usize,
    ) -> Vec<(ContextLayer, Value)> {
        let mut layers = self.default_priority_layers(domain);
        layers.truncate(max_layers);
        self.resolve_layered_context(&layers, domain)
    }

    fn resolve_layer(&self, layer: ContextLayer, domain: Option<&str>) -> Value {
        match layer {
            ContextLayer::Session => self.session_layer(),
            ContextLayer::Action => self.action_layer(domain),
            ContextLayer::Thread => self.thread_layer(domain),
            ContextLayer::Intent => self.intent_layer(),
        }
    }

    fn session_layer(&self) -> Value {
        json!({
            "session_id": self.session_id.as_str(),
            "room_id": self.room_id,
            "room_name": self.room_name,
            "client_id": self.client_id,
            "device_id": self.device_id,
            "language": self.language,
            "created_at": self.created_at.as_datetime().to_rfc3339(),
            "last_activity": self.last_activity.as_datetime().to_rfc3339(),
        })
    }

    fn action_layer(&self, domain: Option<&str>) -> Value {
        let in_scope = |record: &&ActionRecord| domain.map_or(true, |d| record.domain == d);
        let active: Vec<Value> = self
            .active_actions
            .values()
            .filter(in_scope)
            .map(ActionRecord::to_action_metadata)
            .collect();
        let recent: Vec<&ActionRecord> = self.recent_actions.iter().filter(in_scope).collect();
        let failed: Vec<&ActionRecord> = self.failed_actions.iter().filter(in_scope).collect();
        let error_count: u32 = match domain {
            Some(d) => self.action_error_count(d),
            None => self.action_error_count.values().sum(),
        };
        json!({
            "domain": domain,
            "active_actions": active,
            "recent_actions": tail(&recent, ACTION_LAYER_RECENT),
            "failed_actions": tail(&failed, ACTION_LAYER_FAILED),
            "error_count": error_count,
        })
    }

    fn thread_layer(&self, domain: Option<&str>) -> Value {
        match domain {
            Some(d) => json!({
                "domain": d,
                "messages": self.thread_messages(d, THREAD_LAYER_MESSAGES),
                "context": self.thread_context(d),
            }),
            None => json!({ "threads": self.threads_summary() }),
        }
    }

    fn intent_layer(&self) -> Value {
        let skip = self
            .conversation_history
            .len()
            .saturating_sub(INTENT_LAYER_TURNS);
        let turns: Vec<_> = self.conversation_history.iter().skip(skip).collect();
        json!({
            "recent_turns": turns,
            "conversation_state": self.conversation_state.as_str(),
            "state_context": self.state_context,
        })
    }
}

fn tail<'a>(records: &[&'a ActionRecord], n: usize) -> Vec<&'a ActionRecord> {
    let skip = records.len().saturating_sub(n);
    records[skip..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{ClientContext, TurnRole};
    use crate::domain::foundation::SessionId;
    use serde_json::Map;

    fn ctx() -> ConversationContext {
        ConversationContext::from_client(
            SessionId::new("kitchen_session").unwrap(),
            &ClientContext::for_room("kitchen", "Kitchen"),
            "en",
        )
    }

    #[test]
    fn only_requested_layers_in_requested_order() {
        let ctx = ctx();
        let resolved = ctx.resolve_layered_context(&[ContextLayer::Intent, ContextLayer::Session], None);
        let layers: Vec<ContextLayer> = resolved.iter().map(|(l, _)| *l).collect();
        assert_eq!(layers, vec![ContextLayer::Intent, ContextLayer::Session]);
    }

    #[test]
    fn repeated_layers_resolve_once() {
        let resolved = ctx().resolve_layered_context(
            &[ContextLayer::Action, ContextLayer::Session, ContextLayer::Action],
            None,
        );
        let layers: Vec<ContextLayer> = resolved.iter().map(|(l, _)| *l).collect();
        assert_eq!(layers, vec![ContextLayer::Action, ContextLayer::Session]);
    }

    #[test]
    fn session_layer_carries_room() {
        let resolved = ctx().resolve_layered_context(&[ContextLayer::Session], None);
        assert_eq!(resolved[0].1["room_name"], "Kitchen");
        assert_eq!(resolved[0].1["session_id"], "kitchen_session");
    }

    #[test]
    fn action_layer_filters_by_domain() {
        let mut ctx = ctx();
        ctx.begin_action(ActionRecord::started("audio", "play", "audio"));
        ctx.begin_action(ActionRecord::started("timer", "set", "timer"));
        ctx.complete_action("timer", false, Some("timeout"));

        let resolved = ctx.resolve_layered_context(&[ContextLayer::Action], Some("audio"));
        let layer = &resolved[0].1;
        assert_eq!(layer["active_actions"].as_array().unwrap().len(), 1);
        assert_eq!(layer["failed_actions"].as_array().unwrap().len(), 0);

        let all = ctx.resolve_layered_context(&[ContextLayer::Action], None);
        assert_eq!(all[0].1["failed_actions"].as_array().unwrap().len(), 1);
        assert_eq!(all[0].1["error_count"], 1);
    }

    #[test]
    fn thread_layer_returns_last_messages() {
        let mut ctx = ctx();
        for n in 0..8 {
            ctx.add_to_thread("audio", TurnRole::User, format!("m{}", n), Map::new());
        }
        let resolved = ctx.resolve_layered_context(&[ContextLayer::Thread], Some("audio"));
        let messages = resolved[0].1["messages"].as_array().unwrap();
        assert_eq!(messages.len(), THREAD_LAYER_MESSAGES);
        assert_eq!(messages[0]["content"], "m3");
    }

    #[test]
    fn intent_layer_has_last_turns_and_state() {
        let mut ctx = ctx();
        for n in 0..5 {
            ctx.add_to_history(format!("q{}", n), "a", None);
        }
        let resolved = ctx.resolve_layered_context(&[ContextLayer::Intent], None);
        assert_eq!(resolved[0].1["recent_turns"].as_array().unwrap().len(), INTENT_LAYER_TURNS);
        assert_eq!(resolved[0].1["conversation_state"], "idle");
    }

    #[test]
    fn default_priority_depends_on_thread_presence() {
        let mut ctx = ctx();
        assert_eq!(ctx.default_priority_layers(Some("audio"))[0], ContextLayer::Intent);
        ctx.add_to_thread("audio", TurnRole::User, "play", Map::new());
        assert_eq!(ctx.default_priority_layers(Some("audio"))[0], ContextLayer::Thread);
    }

    #[test]
    fn contextual_summary_limits_layers() {
        let mut ctx = ctx();
        ctx.add_to_thread("audio", TurnRole::User, "play", Map::new());
        let summary = ctx.contextual_summary(Some("audio"), 2);
        let layers: Vec<ContextLayer> = summary.iter().map(|(l, _)| *l).collect();
        assert_eq!(layers, vec![ContextLayer::Thread, ContextLayer::Action]);
    }
}
