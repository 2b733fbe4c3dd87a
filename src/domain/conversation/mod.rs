//! Conversation module - per-session conversational state.
//!
//! `ConversationContext` is split across files by concern:
//! - `context` - construction, history, handler contexts, state machine
//! - `actions` - active/recent/failed action bookkeeping
//! - `threads` - per-domain message threads
//! - `layers` - layered context resolution
//! - `retention` - retention policy and cleanup

mod actions;
mod client;
mod context;
mod layers;
mod retention;
mod state;
mod threads;

pub use actions::{ErrorSummary, FAILED_ACTIONS_LIMIT, RECENT_ACTIONS_LIMIT};
pub use client::ClientContext;
pub use context::{
    ConversationContext, DialogueTurn, HandlerContext, HistoryEntry, StateSummary, TurnRole,
    CONVERSATION_HANDLER, HANDLER_CONTEXT_SEED_TURNS, HISTORY_HARD_LIMIT,
};
pub use layers::ContextLayer;
pub use retention::{
    CleanupReport, CleanupTrigger, MemoryManagement, MemoryUsage, RetentionPolicy,
    TrackedCollection,
};
pub use state::{
    is_conversation_ending, ConversationState, StateChange, CONTEXTUAL_DOMAIN,
    CONVERSATION_DOMAIN, CONVERSATION_ENDING_PHRASES,
};
pub use threads::{DomainThread, ThreadMessage, ThreadSummary, THREAD_MESSAGE_LIMIT};
