//! Integration tests for the workflow manager.
//!
//! Wires the voice pipeline workflow with in-memory adapters and drives it
//! through `WorkflowManager`:
//! 1. Startup with a failing sibling workflow
//! 2. Text requests routed to built-in handlers, conversation state tracking
//! 3. Warm-up of lazily loading providers
//! 4. Hot reload keeps sessions and reactivates the workflow

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assistant_core::adapters::{InMemoryComponentRegistry, InMemoryPatternSource, KeywordRecognizer};
use assistant_core::application::handlers::{register_builtin_handlers, ConversationHandler, TimerHandler};
use assistant_core::application::workflow::{
    Component, Workflow, WorkflowError, CONTEXT_MANAGER, INTENT_ORCHESTRATOR, NLU, VOICE_ASSISTANT,
};
use assistant_core::application::{
    ActionTracker, IntentOrchestrator, SessionRegistry, WorkflowManager, WorkflowRegistry,
    WorkflowSettings,
};
use assistant_core::domain::conversation::{ClientContext, ConversationState};
use assistant_core::domain::foundation::SessionId;
use assistant_core::domain::intent::{Intent, IntentResult};
use assistant_core::domain::pipeline::{all_stages_enabled, RequestContext};
use assistant_core::domain::workflow::{LoadProgress, WorkflowState};
use assistant_core::ports::{AudioChunk, IntentRecognizer, ProviderComponent, ProviderError};
use futures::stream::{BoxStream, StreamExt};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// A workflow whose initialization always fails.
struct BrokenWorkflow {
    name: String,
}

#[async_trait]
impl Workflow for BrokenWorkflow {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_component(&mut self, _name: &str, _component: Component) {}

    fn component_names(&self) -> Vec<String> {
        Vec::new()
    }

    async fn initialize(&mut self) -> Result<(), WorkflowError> {
        Err(WorkflowError::Initialization {
            workflow: self.name.clone(),
            reason: "model files missing".into(),
        })
    }

    fn load_progress(&self) -> LoadProgress {
        LoadProgress::default()
    }

    async fn process_text(&self, _text: &str, _request: RequestContext) -> IntentResult {
        unreachable!("never initialized")
    }

    fn process_audio_stream(
        self: Arc<Self>,
        _audio: BoxStream<'static, AudioChunk>,
        _request: RequestContext,
    ) -> BoxStream<'static, IntentResult> {
        futures::stream::empty().boxed()
    }

    async fn cleanup(&self) {}
}

/// Recognizer that reports models loading in the background.
struct LoadingRecognizer {
    inner: KeywordRecognizer,
    loaded: AtomicUsize,
}

impl ProviderComponent for LoadingRecognizer {
    fn name(&self) -> &str {
        "loading_recognizer"
    }

    fn load_progress(&self) -> Option<LoadProgress> {
        Some(LoadProgress::new(self.loaded.load(Ordering::SeqCst), 2))
    }
}

#[async_trait]
impl IntentRecognizer for LoadingRecognizer {
    async fn recognize(&self, text: &str, session_id: &SessionId, language: &str) -> Result<Intent, ProviderError> {
        self.inner.recognize(text, session_id, language).await
    }
}

struct Assistant {
    manager: WorkflowManager,
    sessions: Arc<SessionRegistry>,
}

fn assistant(recognizer: Component, enabled: &[&str]) -> Assistant {
    let patterns = Arc::new(
        InMemoryPatternSource::new()
            .with_table("timer", TimerHandler::default_patterns())
            .with_table("conversation", ConversationHandler::default_patterns()),
    );
    let mut orchestrator = IntentOrchestrator::new(Arc::new(ActionTracker::new()));
    assert!(register_builtin_handlers(&mut orchestrator, patterns, None, true).is_empty());

    let sessions = Arc::new(SessionRegistry::default());
    let components = InMemoryComponentRegistry::new()
        .with_component(INTENT_ORCHESTRATOR, Component::Orchestrator(Arc::new(orchestrator)))
        .with_component(CONTEXT_MANAGER, Component::Sessions(Arc::clone(&sessions)))
        .with_component(NLU, recognizer);

    let registry = WorkflowRegistry::with_voice_pipeline().with(
        "broken",
        Arc::new(|name: &str, _settings: &WorkflowSettings| {
            Box::new(BrokenWorkflow { name: name.to_string() }) as Box<dyn Workflow>
        }),
    );
    let settings = WorkflowSettings {
        enabled: enabled.iter().map(|s| s.to_string()).collect(),
        default_workflow: VOICE_ASSISTANT.to_string(),
        progress_poll_interval: Duration::from_millis(50),
        stages: all_stages_enabled(),
    };

    Assistant {
        manager: WorkflowManager::new(registry, Arc::new(components), settings),
        sessions,
    }
}

fn keyword_nlu() -> Component {
    Component::Recognizer(Arc::new(KeywordRecognizer::with_default_phrases()))
}

fn kitchen() -> SessionId {
    SessionId::new("kitchen").unwrap()
}

impl Assistant {
    async fn say(&self, text: &str) -> IntentResult {
        self.manager
            .process_text_input(text, kitchen(), false, ClientContext::for_room("kitchen", "Kitchen"))
            .await
    }

    async fn conversation_state(&self) -> ConversationState {
        let ctx = self.sessions.get(&kitchen()).expect("session exists");
        let state = ctx.lock().await.conversation_state();
        state
    }
}

// =============================================================================
// Startup
// =============================================================================

#[tokio::test]
async fn failing_sibling_does_not_block_default_workflow() {
    let assistant = assistant(keyword_nlu(), &[VOICE_ASSISTANT, "broken"]);

    let summary = assistant.manager.initialize().await.unwrap();

    assert_eq!(summary.active.as_deref(), Some(VOICE_ASSISTANT));
    assert_eq!(summary.failed, vec!["broken"]);
    let status = assistant.manager.status();
    assert_eq!(status.workflows[VOICE_ASSISTANT].state, WorkflowState::Ready);
    assert_eq!(status.workflows["broken"].state, WorkflowState::Error);
    assert_eq!(status.available, vec!["broken", VOICE_ASSISTANT]);
    assert_eq!(
        status.workflows[VOICE_ASSISTANT].components,
        vec![CONTEXT_MANAGER, INTENT_ORCHESTRATOR, NLU]
    );
}

// =============================================================================
// Requests
// =============================================================================

#[tokio::test]
async fn conversation_state_follows_intents() {
    let assistant = assistant(keyword_nlu(), &[VOICE_ASSISTANT]);
    assistant.manager.initialize().await.unwrap();

    let reply = assistant.say("let's chat").await;
    assert!(reply.success);
    assert_eq!(assistant.conversation_state().await, ConversationState::Conversing);

    let reply = assistant.say("ok bye").await;
    assert!(reply.success);
    assert_eq!(reply.metadata["conversation_state"], "idle");
    assert_eq!(assistant.conversation_state().await, ConversationState::Idle);
}

#[tokio::test]
async fn timer_runs_in_background_until_cancelled() {
    let assistant = assistant(keyword_nlu(), &[VOICE_ASSISTANT]);
    assistant.manager.initialize().await.unwrap();

    let started = assistant.say("set a timer for 10 minutes").await;
    assert!(started.success);
    assert_eq!(started.started_action_domains(), vec!["timer"]);
    {
        let ctx = assistant.sessions.get(&kitchen()).unwrap();
        assert!(ctx.lock().await.active_action("timer").is_some());
    }

    let cancelled = assistant.say("cancel the timer").await;
    assert!(cancelled.success);
    assert_eq!(cancelled.metadata["cancelled"], true);

    let ctx = assistant.sessions.get(&kitchen()).unwrap();
    for _ in 0..100 {
        if ctx.lock().await.active_action("timer").is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(ctx.lock().await.active_action("timer").is_none());
}

#[tokio::test]
async fn first_request_bootstraps_default_workflow() {
    let assistant = assistant(keyword_nlu(), &[VOICE_ASSISTANT]);

    let reply = assistant.say("what's up").await;

    assert!(reply.success);
    assert_eq!(reply.metadata["workflow"], VOICE_ASSISTANT);
    assert_eq!(assistant.manager.active_workflow().as_deref(), Some(VOICE_ASSISTANT));
}

// =============================================================================
// Warm-up and reload
// =============================================================================

#[tokio::test(start_paused = true)]
async fn warming_workflow_serves_requests_and_becomes_ready() {
    let recognizer = Arc::new(LoadingRecognizer {
        inner: KeywordRecognizer::with_default_phrases(),
        loaded: AtomicUsize::new(1),
    });
    let assistant = assistant(Component::Recognizer(recognizer.clone()), &[VOICE_ASSISTANT]);

    let summary = assistant.manager.initialize().await.unwrap();
    assert_eq!(summary.warming_up, vec![VOICE_ASSISTANT]);
    assert!(assistant.say("let's chat").await.success);
    assert_eq!(assistant.manager.status().overall_progress, 50.0);

    recognizer.loaded.store(2, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(120)).await;

    let status = assistant.manager.status();
    assert_eq!(status.workflows[VOICE_ASSISTANT].state, WorkflowState::Ready);
    assert_eq!(status.overall_progress, 100.0);
    assert!(!assistant.manager.is_monitoring().await);
}

#[tokio::test]
async fn hot_reload_keeps_sessions() {
    let assistant = assistant(keyword_nlu(), &[VOICE_ASSISTANT]);
    assistant.manager.initialize().await.unwrap();
    assistant.say("let's chat").await;

    assert!(assistant.manager.hot_reload_workflow(VOICE_ASSISTANT).await);

    assert_eq!(assistant.manager.active_workflow().as_deref(), Some(VOICE_ASSISTANT));
    assert_eq!(assistant.conversation_state().await, ConversationState::Conversing);
    assert!(assistant.say("hello again").await.success);
}
