//! Intent dispatch.
//!
//! - `DonationDispatcher` - routes intents to one handler using its pattern table
//! - `IntentOrchestrator` - chooses among handlers and records each turn

mod dispatcher;
mod errors;
mod orchestrator;

pub use dispatcher::{
    DispatchContext, DonationDispatcher, DonationHandler, HandlerCapabilities, HandlerMethod,
    RoutedHandler,
};
pub use errors::{DispatchError, HandlerError, RegistrationError};
pub use orchestrator::IntentOrchestrator;
