//! Conversation state machine.
//!
//! Tracks whether a session is idle, in free conversation, asking the user to
//! clarify, or following up on earlier context.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;
use crate::domain::intent::Intent;

/// Domain whose intents count as general conversation.
pub const CONVERSATION_DOMAIN: &str = "conversation";

/// Domain whose intents refer back to earlier context.
pub const CONTEXTUAL_DOMAIN: &str = "contextual";

/// Phrases that end a conversation, matched on whole words.
pub const CONVERSATION_ENDING_PHRASES: &[&str] = &[
    "bye",
    "goodbye",
    "see you",
    "that's all",
    "end conversation",
    "stop conversation",
    "пока",
    "до свидания",
];

/// Dialogue state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// No dialogue in progress.
    #[default]
    Idle,

    /// Free-form multi-turn conversation.
    Conversing,

    /// Recognition failed and the assistant needs the user to rephrase.
    Clarifying,

    /// Following up on an earlier action or thread.
    Contextual,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Conversing => "conversing",
            Self::Clarifying => "clarifying",
            Self::Contextual => "contextual",
        }
    }

    /// State an intent asks for, or None when the intent has no opinion.
    ///
    /// Rules, first match wins: recognition fallback asks for Clarifying,
    /// ending phrases ask for Idle, general conversation asks for Conversing
    /// only from Idle or Clarifying, and the contextual domain asks for
    /// Contextual.
    pub fn target_for_intent(&self, intent: &Intent) -> Option<ConversationState> {
        if intent.is_recognition_fallback() {
            return Some(Self::Clarifying);
        }
        if is_conversation_ending(intent.raw_text()) {
            return Some(Self::Idle);
        }
        if intent.domain() == CONVERSATION_DOMAIN {
            return match self {
                Self::Idle | Self::Clarifying => Some(Self::Conversing),
                _ => None,
            };
        }
        if intent.domain() == CONTEXTUAL_DOMAIN {
            return Some(Self::Contextual);
        }
        None
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for ConversationState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConversationState::*;
        matches!(
            (self, target),
            (Idle, Conversing)
                | (Idle, Clarifying)
                | (Idle, Contextual)
                | (Conversing, Idle)
                | (Conversing, Clarifying)
                | (Conversing, Contextual)
                | (Clarifying, Conversing)
                | (Clarifying, Idle)
                | (Contextual, Idle)
                | (Contextual, Conversing)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConversationState::*;
        match self {
            Idle => vec![Conversing, Clarifying, Contextual],
            Conversing => vec![Idle, Clarifying, Contextual],
            Clarifying => vec![Conversing, Idle],
            Contextual => vec![Idle, Conversing],
        }
    }
}

/// Outcome of offering an intent to the conversation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// No rule applied, or the target equals the current state.
    Unchanged(ConversationState),
    Transitioned {
        from: ConversationState,
        to: ConversationState,
    },
    /// A rule asked for a transition the state machine does not allow.
    Rejected {
        current: ConversationState,
        attempted: ConversationState,
    },
}

impl StateChange {
    /// State the context is in after the change was applied.
    pub fn state(&self) -> ConversationState {
        match self {
            StateChange::Unchanged(state) => *state,
            StateChange::Transitioned { to, .. } => *to,
            StateChange::Rejected { current, .. } => *current,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, StateChange::Rejected { .. })
    }
}

/// True when the text contains a conversation-ending phrase as whole words.
pub fn is_conversation_ending(text: &str) -> bool {
    let haystack = format!(" {} ", normalize(text));
    CONVERSATION_ENDING_PHRASES
        .iter()
        .any(|phrase| haystack.contains(&format!(" {} ", normalize(phrase))))
}

fn normalize(text: &str) -> String {
    let spaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
