//! ConversationHandler - free-form chat.
//!
//! Keeps the dialogue in the session's `conversation` handler context and
//! mirrors it into the `conversation` domain thread. Replies come from the
//! response generator when one is available, otherwise from templates.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Map;

use crate::application::dispatch::{DispatchContext, DonationHandler, HandlerError, HandlerMethod};
use crate::domain::conversation::{
    ConversationState, DialogueTurn, TurnRole, CONVERSATION_DOMAIN, CONVERSATION_HANDLER,
};
use crate::domain::intent::{Intent, IntentResult, PatternTable};
use crate::ports::{ProviderComponent, ResponseGenerator};

const TEMPLATE_REPLY: &str = "I'm listening. Tell me more.";
const CLARIFY_REPLY: &str = "Sorry, I didn't catch that. Could you say it another way?";
const START_REPLY: &str = "Sure, let's talk. What's on your mind?";
const END_REPLY: &str = "Okay, talk to you later.";
const CLEAR_REPLY: &str = "I've cleared our conversation.";

pub struct ConversationHandler {
    generator: Option<Arc<dyn ResponseGenerator>>,
}

impl ConversationHandler {
    pub fn new(generator: Option<Arc<dyn ResponseGenerator>>) -> Self {
        Self { generator }
    }

    /// Routing data used when no external table is supplied.
    pub fn default_patterns() -> PatternTable {
        PatternTable::new()
            .with_domain(CONVERSATION_DOMAIN)
            .with_method("general", "general")
            .with_method("start", "start")
            .with_method("end", "end")
            .with_method("clear", "clear")
    }

    fn general<'a>(
        &'a self,
        intent: &'a Intent,
        ctx: &'a DispatchContext,
    ) -> BoxFuture<'a, Result<IntentResult, HandlerError>> {
        async move {
            let (turns, language) = {
                let mut conversation = ctx.conversation.lock().await;
                conversation
                    .handler_context(CONVERSATION_HANDLER)
                    .push_turn(TurnRole::User, intent.raw_text());
                conversation.add_to_thread(
                    CONVERSATION_DOMAIN,
                    TurnRole::User,
                    intent.raw_text(),
                    Map::new(),
                );
                let turns: Vec<DialogueTurn> =
                    conversation.handler_context(CONVERSATION_HANDLER).turns.clone();
                (turns, conversation.language().to_string())
            };

            let (reply, source) = if intent.is_recognition_fallback() {
                (CLARIFY_REPLY.to_string(), "template")
            } else {
                self.generate_reply(&turns, &language).await
            };

            {
                let mut conversation = ctx.conversation.lock().await;
                conversation
                    .handler_context(CONVERSATION_HANDLER)
                    .push_turn(TurnRole::Assistant, reply.clone());
                conversation.add_to_thread(
                    CONVERSATION_DOMAIN,
                    TurnRole::Assistant,
                    reply.clone(),
                    Map::new(),
                );
            }

            Ok(IntentResult::success(reply).with_metadata("response_source", source))
        }
        .boxed()
    }

    fn start<'a>(
        &'a self,
        _intent: &'a Intent,
        ctx: &'a DispatchContext,
    ) -> BoxFuture<'a, Result<IntentResult, HandlerError>> {
        async move {
            let mut conversation = ctx.conversation.lock().await;
            if let Err(err) =
                conversation.transition_state(ConversationState::Conversing, Some("conversation.start"))
            {
                return Err(HandlerError::Execution(err.to_string()));
            }
            conversation
                .handler_context(CONVERSATION_HANDLER)
                .push_turn(TurnRole::Assistant, START_REPLY);
            Ok(IntentResult::success(START_REPLY))
        }
        .boxed()
    }

    fn end<'a>(
        &'a self,
        _intent: &'a Intent,
        ctx: &'a DispatchContext,
    ) -> BoxFuture<'a, Result<IntentResult, HandlerError>> {
        async move {
            let mut conversation = ctx.conversation.lock().await;
            if let Err(err) =
                conversation.transition_state(ConversationState::Idle, Some("conversation.end"))
            {
                return Err(HandlerError::Execution(err.to_string()));
            }
            conversation.clear_handler_context(CONVERSATION_HANDLER, true);
            Ok(IntentResult::success(END_REPLY))
        }
        .boxed()
    }

    fn clear<'a>(
        &'a self,
        _intent: &'a Intent,
        ctx: &'a DispatchContext,
    ) -> BoxFuture<'a, Result<IntentResult, HandlerError>> {
        async move {
            let mut conversation = ctx.conversation.lock().await;
            conversation.clear_handler_context(CONVERSATION_HANDLER, false);
            conversation.clear_thread(CONVERSATION_DOMAIN, false);
            Ok(IntentResult::success(CLEAR_REPLY))
        }
        .boxed()
    }

    async fn generate_reply(&self, turns: &[DialogueTurn], language: &str) -> (String, &'static str) {
        match &self.generator {
            Some(generator) if generator.is_available() => {
                match generator.generate(turns, language).await {
                    Ok(reply) if !reply.trim().is_empty() => (reply, "generator"),
                    Ok(_) => (TEMPLATE_REPLY.to_string(), "template"),
                    Err(err) => {
                        tracing::warn!(generator = generator.name(), error = %err, "Response generation failed; using template");
                        (TEMPLATE_REPLY.to_string(), "template")
                    }
                }
            }
            _ => (TEMPLATE_REPLY.to_string(), "template"),
        }
    }
}

impl DonationHandler for ConversationHandler {
    fn name(&self) -> &str {
        CONVERSATION_HANDLER
    }

    fn methods() -> Vec<(&'static str, HandlerMethod<Self>)> {
        vec![
            ("general", Self::general as HandlerMethod<Self>),
            ("start", Self::start as HandlerMethod<Self>),
            ("end", Self::end as HandlerMethod<Self>),
            ("clear", Self::clear as HandlerMethod<Self>),
        ]
    }
}
