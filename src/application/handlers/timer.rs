//! TimerHandler - countdown timers as fire-and-forget actions.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use crate::application::dispatch::{DispatchContext, DonationHandler, HandlerError, HandlerMethod};
use crate::domain::conversation::TurnRole;
use crate::domain::intent::{Intent, IntentResult, PatternTable};

pub const TIMER_DOMAIN: &str = "timer";
const DURATION_ENTITY: &str = "duration";
const LABEL_ENTITY: &str = "label";
/// Upper bound on a timer, one day.
const MAX_TIMER_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Default)]
pub struct TimerHandler;

impl TimerHandler {
    pub fn new() -> Self {
        Self
    }

    /// Routing data used when no external table is supplied.
    pub fn default_patterns() -> PatternTable {
        PatternTable::new()
            .with_domain(TIMER_DOMAIN)
            .with_method("set_timer", "set")
            .with_method("cancel_timer", "cancel")
    }

    fn set_timer<'a>(
        &'a self,
        intent: &'a Intent,
        ctx: &'a DispatchContext,
    ) -> BoxFuture<'a, Result<IntentResult, HandlerError>> {
        self.start_timer(intent, ctx).boxed()
    }

    async fn start_timer(
        &self,
        intent: &Intent,
        ctx: &DispatchContext,
    ) -> Result<IntentResult, HandlerError> {
        let secs = duration_secs(intent)?;
        let label = intent.entity_str(LABEL_ENTITY).map(str::to_string);

        let finished_label = label.clone();
        let started = ctx
            .actions
            .start_action(&ctx.conversation, TIMER_DOMAIN, TIMER_DOMAIN, "set_timer", move |token| async move {
                tokio::select! {
                    _ = token.cancelled() => Err("timer cancelled".to_string()),
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                        tracing::info!(label = ?finished_label, secs, "Timer finished");
                        Ok(())
                    }
                }
            })
            .await;

        let text = match &label {
            Some(label) => format!("{} timer set for {}.", label, describe_duration(secs)),
            None => format!("Timer set for {}.", describe_duration(secs)),
        };

        {
            let mut conversation = ctx.conversation.lock().await;
            let mut metadata = Map::new();
            metadata.insert("action_id".to_string(), Value::String(started.action_id.to_string()));
            metadata.insert("duration_secs".to_string(), Value::from(secs));
            conversation.add_to_thread(TIMER_DOMAIN, TurnRole::Assistant, text.clone(), metadata);
            conversation.update_thread_context(TIMER_DOMAIN, "last_duration_secs", secs);
        }

        Ok(IntentResult::success(text).with_action_metadata(started.metadata))
    }

    fn cancel_timer<'a>(
        &'a self,
        _intent: &'a Intent,
        ctx: &'a DispatchContext,
    ) -> BoxFuture<'a, Result<IntentResult, HandlerError>> {
        async move {
            let cancelled = ctx
                .actions
                .cancel_action(&ctx.conversation, TIMER_DOMAIN, "user request")
                .await;
            let text = if cancelled {
                "Timer cancelled."
            } else {
                "There is no timer running."
            };
            Ok(IntentResult::success(text).with_metadata("cancelled", cancelled))
        }
        .boxed()
    }
}

impl DonationHandler for TimerHandler {
    fn name(&self) -> &str {
        TIMER_DOMAIN
    }

    fn methods() -> Vec<(&'static str, HandlerMethod<Self>)> {
        vec![
            ("set_timer", Self::set_timer as HandlerMethod<Self>),
            ("cancel_timer", Self::cancel_timer as HandlerMethod<Self>),
        ]
    }
}

/// Reads the `duration` entity as whole seconds.
fn duration_secs(intent: &Intent) -> Result<u64, HandlerError> {
    let value = intent
        .entity(DURATION_ENTITY)
        .ok_or_else(|| HandlerError::MissingEntity(DURATION_ENTITY.to_string()))?;
    let invalid = |reason: &str| HandlerError::InvalidEntity {
        entity: DURATION_ENTITY.to_string(),
        reason: reason.to_string(),
    };

    let secs = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| invalid("not a non-negative number"))?;

    if secs == 0 {
        return Err(invalid("must be at least one second"));
    }
    if secs > MAX_TIMER_SECS {
        return Err(invalid("longer than one day"));
    }
    Ok(secs)
}

fn describe_duration(secs: u64) -> String {
    fn unit(n: u64, name: &str) -> String {
        if n == 1 {
            format!("1 {}", name)
        } else {
            format!("{} {}s", n, name)
        }
    }

    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let parts: Vec<String> = [(hours, "hour"), (minutes, "minute"), (seconds, "second")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, name)| unit(n, name))
        .collect();
    parts.join(" ")
}
