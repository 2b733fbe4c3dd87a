//! Built-in intent handlers.
//!
//! - `ConversationHandler` - free-form chat with template fallback
//! - `TimerHandler` - countdown timers run as background actions

mod conversation;
mod timer;

use std::sync::Arc;

pub use conversation::ConversationHandler;
pub use timer::{TimerHandler, TIMER_DOMAIN};

use crate::application::dispatch::{DonationDispatcher, IntentOrchestrator, RegistrationError};
use crate::ports::{PatternSource, ResponseGenerator};

/// Registers every built-in handler with the orchestrator.
///
/// A handler whose registration fails is left out and its error returned;
/// the others are still registered.
pub fn register_builtin_handlers(
    orchestrator: &mut IntentOrchestrator,
    source: Arc<dyn PatternSource>,
    generator: Option<Arc<dyn ResponseGenerator>>,
    strict: bool,
) -> Vec<RegistrationError> {
    let mut errors = Vec::new();

    match DonationDispatcher::register(TimerHandler::new(), Arc::clone(&source), strict) {
        Ok(dispatcher) => orchestrator.register(Arc::new(dispatcher)),
        Err(err) => {
            tracing::error!(error = %err, "Timer handler not registered");
            errors.push(err);
        }
    }

    // Registered last: its domain also serves as the catch-all for chit-chat.
    match DonationDispatcher::register(ConversationHandler::new(generator), source, strict) {
        Ok(dispatcher) => orchestrator.register(Arc::new(dispatcher)),
        Err(err) => {
            tracing::error!(error = %err, "Conversation handler not registered");
            errors.push(err);
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryPatternSource;
    use crate::application::actions::ActionTracker;

    #[test]
    fn registers_handlers_with_tables() {
        let source = Arc::new(
            InMemoryPatternSource::new()
                .with_table("timer", TimerHandler::default_patterns())
                .with_table("conversation", ConversationHandler::default_patterns()),
        );
        let mut orchestrator = IntentOrchestrator::new(Arc::new(ActionTracker::new()));
        let errors = register_builtin_handlers(&mut orchestrator, source, None, true);

        assert!(errors.is_empty());
        assert_eq!(orchestrator.handler_names(), vec!["timer", "conversation"]);
    }

    #[test]
    fn missing_table_skips_only_that_handler() {
        let source = Arc::new(
            InMemoryPatternSource::new().with_table("conversation", ConversationHandler::default_patterns()),
        );
        let mut orchestrator = IntentOrchestrator::new(Arc::new(ActionTracker::new()));
        let errors = register_builtin_handlers(&mut orchestrator, source, None, false);

        assert_eq!(
            errors,
            vec![RegistrationError::DonationMissing { handler: "timer".into() }]
        );
        assert_eq!(orchestrator.handler_names(), vec!["conversation"]);
    }
}
