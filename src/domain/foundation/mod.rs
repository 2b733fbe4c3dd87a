//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, the state machine trait, and the error types
//! that the rest of the assistant core builds on.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{ErrorCode, ValidationError};
pub use ids::{ActionId, SessionId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
