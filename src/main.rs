//! Interactive text front end.
//!
//! Reads one utterance per line from stdin and prints the assistant's reply.
//! `/status` prints workflow status, `/reload` hot reloads the active
//! workflow, `/quit` exits.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use assistant_core::adapters::{
    InMemoryComponentRegistry, InMemoryPatternSource, KeywordRecognizer, LoggingNotifier,
};
use assistant_core::application::handlers::{
    register_builtin_handlers, ConversationHandler, TimerHandler, TIMER_DOMAIN,
};
use assistant_core::application::workflow::{
    Component, CONFIG, CONTEXT_MANAGER, INTENT_ORCHESTRATOR, NLU,
};
use assistant_core::application::{
    ActionTracker, IntentOrchestrator, SessionRegistry, SessionSettings, WorkflowManager,
    WorkflowRegistry, WorkflowSettings,
};
use assistant_core::config::AppConfig;
use assistant_core::domain::conversation::{ClientContext, CONVERSATION_HANDLER};
use assistant_core::domain::foundation::SessionId;
use assistant_core::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    telemetry::init_tracing(&config.logging);
    let config = Arc::new(config);

    let sessions = Arc::new(SessionRegistry::new(SessionSettings::from(&config.sessions)));
    let patterns = Arc::new(
        InMemoryPatternSource::new()
            .with_table(TIMER_DOMAIN, TimerHandler::default_patterns())
            .with_table(CONVERSATION_HANDLER, ConversationHandler::default_patterns()),
    );
    let actions = Arc::new(ActionTracker::new().with_notifier(Arc::new(LoggingNotifier::new())));

    let mut orchestrator = IntentOrchestrator::new(Arc::clone(&actions));
    let errors = register_builtin_handlers(
        &mut orchestrator,
        patterns,
        None,
        config.dispatch.strict_method_binding,
    );
    if !errors.is_empty() {
        tracing::warn!(count = errors.len(), "Some handlers were not registered");
    }

    let components = InMemoryComponentRegistry::new()
        .with_component(INTENT_ORCHESTRATOR, Component::Orchestrator(Arc::new(orchestrator)))
        .with_component(CONTEXT_MANAGER, Component::Sessions(Arc::clone(&sessions)))
        .with_component(NLU, Component::Recognizer(Arc::new(KeywordRecognizer::with_default_phrases())))
        .with_component(CONFIG, Component::Config(Arc::clone(&config)));
    let manager = WorkflowManager::new(
        WorkflowRegistry::with_voice_pipeline(),
        Arc::new(components),
        WorkflowSettings::from(&config.workflows),
    );
    manager.initialize().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = {
        let sessions = Arc::clone(&sessions);
        let interval = config.sessions.cleanup_interval();
        tokio::spawn(async move { sessions.run_cleanup_loop(interval, shutdown_rx).await })
    };

    let session_id = SessionId::default_session();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/status" => println!("{}", serde_json::to_string_pretty(&manager.status())?),
            "/reload" => {
                let name = manager
                    .active_workflow()
                    .unwrap_or_else(|| config.workflows.default_workflow.clone());
                let reloaded = manager.hot_reload_workflow(&name).await;
                println!("reload {}: {}", name, if reloaded { "ok" } else { "failed" });
            }
            text => {
                let result = manager
                    .process_text_input(text, session_id.clone(), false, ClientContext::default())
                    .await;
                println!("{}", result.text);
            }
        }
    }

    actions.shutdown();
    let _ = shutdown_tx.send(true);
    if let Err(err) = cleanup.await {
        tracing::warn!(error = %err, "Session cleanup task ended abnormally");
    }
    manager.shutdown().await;
    Ok(())
}
