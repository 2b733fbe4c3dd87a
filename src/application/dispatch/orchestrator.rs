//! IntentOrchestrator - picks a handler for an intent and does the turn
//! bookkeeping around it.

use std::sync::Arc;

use serde_json::{json, Value};

use super::dispatcher::{DispatchContext, HandlerCapabilities, RoutedHandler};
use crate::application::actions::ActionTracker;
use crate::application::sessions::SharedContext;
use crate::domain::foundation::ErrorCode;
use crate::domain::intent::{Intent, IntentResult};

const NO_HANDLER_TEXT: &str = "Sorry, I don't know how to help with that yet.";
const DISPATCH_FAILURE_TEXT: &str = "Sorry, something went wrong while handling that.";

pub struct IntentOrchestrator {
    handlers: Vec<Arc<dyn RoutedHandler>>,
    actions: Arc<ActionTracker>,
}

impl IntentOrchestrator {
    pub fn new(actions: Arc<ActionTracker>) -> Self {
        Self {
            handlers: Vec::new(),
            actions,
        }
    }

    /// Adds a handler. Handlers are consulted in registration order.
    pub fn register(&mut self, handler: Arc<dyn RoutedHandler>) {
        tracing::debug!(handler = handler.name(), "Handler added to orchestrator");
        self.handlers.push(handler);
    }

    pub fn with_handler(mut self, handler: Arc<dyn RoutedHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    pub fn capabilities(&self) -> Vec<HandlerCapabilities> {
        self.handlers.iter().map(|h| h.capabilities()).collect()
    }

    pub fn action_tracker(&self) -> &Arc<ActionTracker> {
        &self.actions
    }

    /// Handles one intent for a session.
    ///
    /// Applies the conversation-state transition, dispatches to the first
    /// handler that accepts the intent and records the turn. Dispatch
    /// problems come back as a failed result, never as an error.
    pub async fn execute(&self, intent: &Intent, conversation: &SharedContext) -> IntentResult {
        let (session_id, state_change) = {
            let mut ctx = conversation.lock().await;
            let change = ctx.apply_intent_transition(intent);
            (ctx.session_id().clone(), change)
        };

        let handler = self.handlers.iter().find(|h| h.can_handle(intent));

        let mut result = match handler {
            None => {
                tracing::warn!(session_id = %session_id, intent = intent.name(), "No handler accepts intent");
                IntentResult::failure_for(
                    NO_HANDLER_TEXT,
                    ErrorCode::NoHandler,
                    intent,
                    format!("no handler accepts '{}'", intent.name()),
                )
            }
            Some(handler) => {
                let dispatch = DispatchContext {
                    session_id: session_id.clone(),
                    conversation: Arc::clone(conversation),
                    actions: Arc::clone(&self.actions),
                };
                let outcome = match handler.execute(intent, &dispatch).await {
                    Ok(result) => result,
                    Err(err) => {
                        tracing::warn!(
                            session_id = %session_id,
                            handler = handler.name(),
                            intent = intent.name(),
                            error = %err,
                            "Intent dispatch failed"
                        );
                        IntentResult::failure_for(
                            DISPATCH_FAILURE_TEXT,
                            err.code(),
                            intent,
                            err.to_string(),
                        )
                    }
                };
                outcome.with_metadata("handler", handler.name())
            }
        };

        let mut ctx = conversation.lock().await;
        ctx.add_to_history(intent.raw_text(), result.text.clone(), Some(intent));
        result
            .metadata
            .insert("conversation_state".to_string(), json!(ctx.conversation_state().as_str()));
        if state_change.is_rejected() {
            result
                .metadata
                .insert("state_transition_rejected".to_string(), Value::Bool(true));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryPatternSource;
    use crate::application::dispatch::{DonationDispatcher, DonationHandler, HandlerError, HandlerMethod};
    use crate::domain::conversation::{ConversationContext, ConversationState};
    use crate::domain::foundation::SessionId;
    use crate::domain::intent::PatternTable;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    struct GreetHandler;

    impl GreetHandler {
        fn hello<'a>(
            &'a self,
            _intent: &'a Intent,
            _ctx: &'a DispatchContext,
        ) -> BoxFuture<'a, Result<IntentResult, HandlerError>> {
            async move { Ok(IntentResult::success("Hi!")) }.boxed()
        }

        fn fail<'a>(
            &'a self,
            _intent: &'a Intent,
            _ctx: &'a DispatchContext,
        ) -> BoxFuture<'a, Result<IntentResult, HandlerError>> {
            async move { Err(HandlerError::Unavailable("llm".into())) }.boxed()
        }
    }

    impl DonationHandler for GreetHandler {
        fn name(&self) -> &str {
            "greet"
        }

        fn methods() -> Vec<(&'static str, HandlerMethod<Self>)> {
            vec![
                ("hello", Self::hello as HandlerMethod<Self>),
                ("fail", Self::fail as HandlerMethod<Self>),
            ]
        }
    }

    fn orchestrator() -> IntentOrchestrator {
        let source = Arc::new(InMemoryPatternSource::new().with_table(
            "greet",
            PatternTable::new()
                .with_domain("conversation")
                .with_method("hello", "general")
                .with_method("fail", "broken"),
        ));
        let dispatcher = DonationDispatcher::register(GreetHandler, source, false).unwrap();
        IntentOrchestrator::new(Arc::new(ActionTracker::new())).with_handler(Arc::new(dispatcher))
    }

    fn context() -> SharedContext {
        Arc::new(tokio::sync::Mutex::new(ConversationContext::new(
            SessionId::new("orchestrator").unwrap(),
            "en",
        )))
    }

    fn intent(name: &str, text: &str) -> Intent {
        Intent::new(name, text, SessionId::new("orchestrator").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn general_conversation_moves_to_conversing_and_records_turn() {
        let orchestrator = orchestrator();
        let ctx = context();
        let result = orchestrator.execute(&intent("conversation.general", "hi"), &ctx).await;

        assert!(result.success);
        assert_eq!(result.metadata["handler"], json!("greet"));
        assert_eq!(result.metadata["conversation_state"], json!("conversing"));
        let ctx = ctx.lock().await;
        assert_eq!(ctx.conversation_state(), ConversationState::Conversing);
        assert_eq!(ctx.conversation_history().back().unwrap().response, "Hi!");
    }

    #[tokio::test]
    async fn unmatched_intent_is_a_polite_failure() {
        let result = orchestrator()
            .execute(&intent("weather.today", "weather?"), &context())
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no_handler"));
        assert_eq!(result.metadata["original_intent"], json!("weather.today"));
    }

    #[tokio::test]
    async fn dispatch_errors_become_failed_results() {
        let orchestrator = orchestrator();
        let ctx = context();

        let missing = orchestrator.execute(&intent("conversation.sing", "sing"), &ctx).await;
        assert_eq!(missing.error.as_deref(), Some("method_not_found"));

        let broken = orchestrator.execute(&intent("conversation.broken", "x"), &ctx).await;
        assert_eq!(broken.error.as_deref(), Some("method_execution_error"));
        assert_eq!(ctx.lock().await.conversation_history().len(), 2);
    }

    #[test]
    fn capabilities_are_aggregated() {
        let caps = orchestrator().capabilities();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].domains, vec!["conversation"]);
    }
}
