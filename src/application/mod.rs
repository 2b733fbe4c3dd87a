//! Application layer - request routing, action tracking and workflow lifecycle.
//!
//! Coordinates domain types through the ports:
//! - `dispatch` - donation-driven intent routing and the orchestrator
//! - `actions` - fire-and-forget action tasks
//! - `sessions` - per-session conversation contexts and periodic cleanup
//! - `handlers` - built-in intent handlers
//! - `workflow` - workflows, component injection and the workflow manager

pub mod actions;
pub mod dispatch;
pub mod handlers;
pub mod sessions;
pub mod workflow;

pub use actions::{ActionTracker, StartedAction};
pub use dispatch::{DispatchContext, DispatchError, IntentOrchestrator, RegistrationError};
pub use sessions::{SessionRegistry, SessionSettings, SharedContext};
pub use workflow::{WorkflowManager, WorkflowRegistry, WorkflowSettings, WorkflowStatus};
