//! VoicePipelineWorkflow - wake word, ASR, normalization, NLU, dispatch, TTS.
//!
//! Every provider is optional. A missing or unavailable provider skips its
//! stage (or falls back) instead of failing the request. Only the
//! orchestrator and the session registry are required.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};

use super::components::{
    Component, ASR, AUDIO, CONFIG, CONTEXT_MANAGER, INTENT_ORCHESTRATOR, LLM, NLU, TEXT_PROCESSOR,
    TTS, VOICE_TRIGGER,
};
use super::{Workflow, WorkflowError};
use crate::application::dispatch::IntentOrchestrator;
use crate::application::sessions::SessionRegistry;
use crate::domain::foundation::ErrorCode;
use crate::domain::intent::{Intent, IntentResult};
use crate::domain::pipeline::{configure_pipeline_stages, PipelineStage, RequestContext, StageTable};
use crate::domain::workflow::LoadProgress;
use crate::ports::{
    AudioChunk, AudioPlayer, IntentRecognizer, ProviderComponent, SpeechSynthesizer,
    SpeechTranscriber, TextProcessor, WakeWordDetector,
};

pub const VOICE_ASSISTANT: &str = "voice_assistant";

const EMPTY_INPUT_TEXT: &str = "I didn't catch anything.";
const NOT_INITIALIZED_TEXT: &str = "The assistant is still starting up.";

pub struct VoicePipelineWorkflow {
    name: String,
    stage_defaults: StageTable,
    components: BTreeMap<String, Component>,
    orchestrator: Option<Arc<IntentOrchestrator>>,
    sessions: Option<Arc<SessionRegistry>>,
    recognizer: Option<Arc<dyn IntentRecognizer>>,
    transcriber: Option<Arc<dyn SpeechTranscriber>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    wake_word: Option<Arc<dyn WakeWordDetector>>,
    audio: Option<Arc<dyn AudioPlayer>>,
    text_processor: Option<Arc<dyn TextProcessor>>,
}

impl VoicePipelineWorkflow {
    pub fn new(name: impl Into<String>, stage_defaults: StageTable) -> Self {
        Self {
            name: name.into(),
            stage_defaults,
            components: BTreeMap::new(),
            orchestrator: None,
            sessions: None,
            recognizer: None,
            transcriber: None,
            synthesizer: None,
            wake_word: None,
            audio: None,
            text_processor: None,
        }
    }

    fn missing(&self, component: &str) -> WorkflowError {
        WorkflowError::MissingComponent {
            workflow: self.name.clone(),
            component: component.to_string(),
        }
    }

    /// Binds a provider stored under `name`, if it has the expected kind.
    fn bind<T: ?Sized>(
        &self,
        name: &str,
        pick: impl Fn(&Component) -> Option<Arc<T>>,
    ) -> Result<Option<Arc<T>>, WorkflowError> {
        match self.components.get(name) {
            None => Ok(None),
            Some(component) => pick(component).map(Some).ok_or_else(|| {
                WorkflowError::InvalidConfiguration(format!(
                    "component '{}' is a {}",
                    name,
                    component.kind()
                ))
            }),
        }
    }

    async fn normalize(&self, text: &str, language: &str, stages: &StageTable) -> String {
        match &self.text_processor {
            Some(processor) if stage_on(stages, PipelineStage::TextProcessing) && processor.is_available() => {
                match processor.normalize(text, language).await {
                    Ok(normalized) => normalized,
                    Err(err) => {
                        tracing::warn!(workflow = %self.name, error = %err, "Text normalization failed; using raw text");
                        text.to_string()
                    }
                }
            }
            _ => text.to_string(),
        }
    }

    async fn recognize(&self, text: &str, request: &RequestContext, language: &str, stages: &StageTable) -> Intent {
        match &self.recognizer {
            Some(recognizer) if stage_on(stages, PipelineStage::Nlu) && recognizer.is_available() => {
                match recognizer.recognize(text, &request.session_id, language).await {
                    Ok(intent) => intent,
                    Err(err) => {
                        tracing::warn!(
                            workflow = %self.name,
                            session_id = %request.session_id,
                            error = %err,
                            "Intent recognition failed; using fallback intent"
                        );
                        Intent::recognition_fallback(text, request.session_id.clone())
                    }
                }
            }
            _ => Intent::recognition_fallback(text, request.session_id.clone()),
        }
    }

    /// Speaks the response. Returns whether audio was played.
    async fn speak(&self, result: &IntentResult, language: &str, stages: &StageTable) -> bool {
        if !stage_on(stages, PipelineStage::Tts) || !result.should_speak || result.text.is_empty() {
            return false;
        }
        let (Some(synthesizer), Some(audio)) = (&self.synthesizer, &self.audio) else {
            return false;
        };
        if !synthesizer.is_available() || !audio.is_available() {
            return false;
        }

        let speech = match synthesizer.synthesize(&result.text, language).await {
            Ok(speech) => speech,
            Err(err) => {
                tracing::warn!(workflow = %self.name, error = %err, "Speech synthesis failed");
                return false;
            }
        };
        match audio.play(&speech).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(workflow = %self.name, error = %err, "Audio playback failed");
                false
            }
        }
    }

    /// Runs one chunk through wake word and ASR. Returns the transcript once
    /// there is something to process.
    async fn listen(
        &self,
        chunk: &AudioChunk,
        request: &RequestContext,
        stages: &StageTable,
        awaiting_wake_word: &mut bool,
    ) -> Option<String> {
        if *awaiting_wake_word {
            let detector = self.wake_word.as_ref()?;
            match detector.detect(chunk).await {
                Ok(result) if result.detected => {
                    tracing::info!(
                        workflow = %self.name,
                        session_id = %request.session_id,
                        word = ?result.word,
                        "Wake word detected"
                    );
                    *awaiting_wake_word = false;
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(workflow = %self.name, error = %err, "Wake word detection failed"),
            }
            return None;
        }

        let transcriber = self.transcriber.as_ref()?;
        if !stage_on(stages, PipelineStage::Asr) || !transcriber.is_available() {
            return None;
        }
        let language = request.client.language.as_deref().unwrap_or("en");
        match transcriber.transcribe(chunk, language).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(workflow = %self.name, error = %err, "Transcription failed");
                None
            }
        }
    }

    fn wake_word_enabled(&self, stages: &StageTable) -> bool {
        stage_on(stages, PipelineStage::VoiceTrigger)
            && self.wake_word.as_ref().map_or(false, |d| d.is_available())
    }
}

fn stage_on(stages: &StageTable, stage: PipelineStage) -> bool {
    stages.get(&stage).copied().unwrap_or(false)
}

fn stages_metadata(stages: &StageTable) -> Value {
    let map: Map<String, Value> = stages
        .iter()
        .map(|(stage, enabled)| (stage.as_str().to_string(), Value::Bool(*enabled)))
        .collect();
    Value::Object(map)
}

#[async_trait]
impl Workflow for VoicePipelineWorkflow {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_component(&mut self, name: &str, component: Component) {
        tracing::debug!(workflow = %self.name, component = name, kind = component.kind(), "Component injected");
        self.components.insert(name.to_string(), component);
    }

    fn component_names(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    async fn initialize(&mut self) -> Result<(), WorkflowError> {
        if !stage_on(&self.stage_defaults, PipelineStage::IntentExecution)
            && self.stage_defaults.contains_key(&PipelineStage::IntentExecution)
        {
            return Err(WorkflowError::InvalidConfiguration(
                "the intent_execution stage cannot be disabled".to_string(),
            ));
        }

        let orchestrator = self.bind(INTENT_ORCHESTRATOR, |c| match c {
            Component::Orchestrator(o) => Some(Arc::clone(o)),
            _ => None,
        })?;
        let sessions = self.bind(CONTEXT_MANAGER, |c| match c {
            Component::Sessions(s) => Some(Arc::clone(s)),
            _ => None,
        })?;
        self.orchestrator = Some(orchestrator.ok_or_else(|| self.missing(INTENT_ORCHESTRATOR))?);
        self.sessions = Some(sessions.ok_or_else(|| self.missing(CONTEXT_MANAGER))?);

        self.recognizer = self.bind(NLU, |c| match c {
            Component::Recognizer(p) => Some(Arc::clone(p)),
            _ => None,
        })?;
        self.transcriber = self.bind(ASR, |c| match c {
            Component::Transcriber(p) => Some(Arc::clone(p)),
            _ => None,
        })?;
        self.synthesizer = self.bind(TTS, |c| match c {
            Component::Synthesizer(p) => Some(Arc::clone(p)),
            _ => None,
        })?;
        self.wake_word = self.bind(VOICE_TRIGGER, |c| match c {
            Component::WakeWord(p) => Some(Arc::clone(p)),
            _ => None,
        })?;
        self.audio = self.bind(AUDIO, |c| match c {
            Component::AudioOutput(p) => Some(Arc::clone(p)),
            _ => None,
        })?;
        self.text_processor = self.bind(TEXT_PROCESSOR, |c| match c {
            Component::TextProcessor(p) => Some(Arc::clone(p)),
            _ => None,
        })?;

        if self.synthesizer.is_some() && self.audio.is_none() {
            tracing::warn!(workflow = %self.name, "Speech synthesizer present without audio output; responses stay silent");
        }
        let unused: Vec<&str> = [LLM, CONFIG]
            .into_iter()
            .filter(|name| self.components.contains_key(*name))
            .collect();

        tracing::info!(
            workflow = %self.name,
            components = ?self.component_names(),
            passive = ?unused,
            "Workflow initialized"
        );
        Ok(())
    }

    fn load_progress(&self) -> LoadProgress {
        self.components.values().filter_map(Component::load_progress).sum()
    }

    async fn process_text(&self, text: &str, request: RequestContext) -> IntentResult {
        let text = text.trim();
        if text.is_empty() {
            return IntentResult::failure(EMPTY_INPUT_TEXT, ErrorCode::ValidationFailed);
        }
        let (Some(orchestrator), Some(sessions)) = (&self.orchestrator, &self.sessions) else {
            return IntentResult::failure(NOT_INITIALIZED_TEXT, ErrorCode::WorkflowUnavailable);
        };

        let conversation = sessions.get_or_create(&request.session_id, &request.client).await;
        let language = conversation.lock().await.language().to_string();
        let stages = configure_pipeline_stages(&self.stage_defaults, &request);

        let normalized = self.normalize(text, &language, &stages).await;
        let intent = self.recognize(&normalized, &request, &language, &stages).await;
        tracing::debug!(
            workflow = %self.name,
            session_id = %request.session_id,
            intent = intent.name(),
            confidence = intent.confidence(),
            "Intent recognized"
        );

        let mut result = orchestrator.execute(&intent, &conversation).await;
        let audio_played = self.speak(&result, &language, &stages).await;

        result
            .metadata
            .insert("workflow".to_string(), Value::String(self.name.clone()));
        result
            .metadata
            .insert("intent".to_string(), Value::String(intent.name().to_string()));
        result.metadata.insert("stages".to_string(), stages_metadata(&stages));
        result
            .metadata
            .insert("audio_played".to_string(), Value::Bool(audio_played));
        result
    }

    fn process_audio_stream(
        self: Arc<Self>,
        audio: BoxStream<'static, AudioChunk>,
        request: RequestContext,
    ) -> BoxStream<'static, IntentResult> {
        let stages = configure_pipeline_stages(&self.stage_defaults, &request);
        let awaiting_wake_word = self.wake_word_enabled(&stages);

        stream::unfold(
            (self, audio, request, stages, awaiting_wake_word),
            |(workflow, mut audio, request, stages, mut awaiting)| async move {
                loop {
                    let Some(chunk) = audio.next().await else {
                        return None;
                    };
                    let Some(text) = workflow.listen(&chunk, &request, &stages, &mut awaiting).await else {
                        continue;
                    };
                    let result = workflow.process_text(&text, request.clone()).await;
                    // Each utterance needs its own wake word.
                    awaiting = workflow.wake_word_enabled(&stages);
                    return Some((result, (workflow, audio, request, stages, awaiting)));
                }
            },
        )
        .boxed()
    }

    async fn cleanup(&self) {
        tracing::info!(workflow = %self.name, "Workflow cleaned up");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryPatternSource, KeywordRecognizer};
    use crate::application::actions::ActionTracker;
    use crate::application::handlers::{register_builtin_handlers, ConversationHandler, TimerHandler};
    use crate::domain::conversation::ClientContext;
    use crate::domain::foundation::SessionId;
    use crate::domain::pipeline::all_stages_enabled;
    use crate::ports::{ProviderError, WakeWordResult};
    use std::sync::Mutex;

    struct EchoTranscriber;

    impl ProviderComponent for EchoTranscriber {
        fn name(&self) -> &str {
            "echo-asr"
        }
    }

    #[async_trait]
    impl SpeechTranscriber for EchoTranscriber {
        async fn transcribe(&self, audio: &AudioChunk, _language: &str) -> Result<String, ProviderError> {
            Ok(String::from_utf8_lossy(&audio.data).into_owned())
        }
    }

    struct MagicWord;

    impl ProviderComponent for MagicWord {
        fn name(&self) -> &str {
            "magic-word"
        }
    }

    #[async_trait]
    impl WakeWordDetector for MagicWord {
        async fn detect(&self, audio: &AudioChunk) -> Result<WakeWordResult, ProviderError> {
            if audio.data == b"computer" {
                Ok(WakeWordResult {
                    detected: true,
                    word: Some("computer".into()),
                    confidence: 0.9,
                })
            } else {
                Ok(WakeWordResult::not_detected())
            }
        }
    }

    struct ToneSynth;

    impl ProviderComponent for ToneSynth {
        fn name(&self) -> &str {
            "tone"
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for ToneSynth {
        async fn synthesize(&self, text: &str, _language: &str) -> Result<Vec<u8>, ProviderError> {
            Ok(text.as_bytes().to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingSpeaker {
        played: Mutex<Vec<Vec<u8>>>,
    }

    impl ProviderComponent for RecordingSpeaker {
        fn name(&self) -> &str {
            "speaker"
        }
    }

    #[async_trait]
    impl AudioPlayer for RecordingSpeaker {
        async fn play(&self, audio: &[u8]) -> Result<(), ProviderError> {
            self.played.lock().unwrap().push(audio.to_vec());
            Ok(())
        }
    }

    fn core_components() -> Vec<(&'static str, Component)> {
        let source = Arc::new(
            InMemoryPatternSource::new()
                .with_table("timer", TimerHandler::default_patterns())
                .with_table("conversation", ConversationHandler::default_patterns()),
        );
        let mut orchestrator = IntentOrchestrator::new(Arc::new(ActionTracker::new()));
        register_builtin_handlers(&mut orchestrator, source, None, true);
        vec![
            (INTENT_ORCHESTRATOR, Component::Orchestrator(Arc::new(orchestrator))),
            (CONTEXT_MANAGER, Component::Sessions(Arc::new(SessionRegistry::default()))),
            (NLU, Component::Recognizer(Arc::new(KeywordRecognizer::with_default_phrases()))),
        ]
    }

    async fn workflow_with(extra: Vec<(&'static str, Component)>) -> VoicePipelineWorkflow {
        let mut workflow = VoicePipelineWorkflow::new(VOICE_ASSISTANT, all_stages_enabled());
        for (name, component) in core_components().into_iter().chain(extra) {
            workflow.add_component(name, component);
        }
        workflow.initialize().await.unwrap();
        workflow
    }

    fn text_request(wants_audio: bool) -> RequestContext {
        RequestContext::text(SessionId::new("living_room").unwrap(), wants_audio, ClientContext::default())
    }

    mod initialization {
        use super::*;

        #[tokio::test]
        async fn requires_orchestrator_and_sessions() {
            let mut workflow = VoicePipelineWorkflow::new(VOICE_ASSISTANT, all_stages_enabled());
            let err = workflow.initialize().await.unwrap_err();
            assert_eq!(
                err,
                WorkflowError::MissingComponent {
                    workflow: VOICE_ASSISTANT.into(),
                    component: INTENT_ORCHESTRATOR.into(),
                }
            );
        }

        #[tokio::test]
        async fn rejects_component_of_wrong_kind() {
            let mut workflow = VoicePipelineWorkflow::new(VOICE_ASSISTANT, all_stages_enabled());
            for (name, component) in core_components() {
                workflow.add_component(name, component);
            }
            workflow.add_component(ASR, Component::Sessions(Arc::new(SessionRegistry::default())));
            assert!(matches!(
                workflow.initialize().await,
                Err(WorkflowError::InvalidConfiguration(_))
            ));
        }

        #[tokio::test]
        async fn without_loading_providers_is_ready() {
            let workflow = workflow_with(vec![]).await;
            assert!(workflow.is_ready());
            assert_eq!(
                workflow.component_names(),
                vec![CONTEXT_MANAGER, INTENT_ORCHESTRATOR, NLU]
            );
        }
    }

    mod text {
        use super::*;

        #[tokio::test]
        async fn routes_text_through_nlu_and_orchestrator() {
            let workflow = workflow_with(vec![]).await;
            let result = workflow
                .process_text("set a timer for 5 minutes", text_request(false))
                .await;

            assert!(result.success, "{:?}", result);
            assert_eq!(result.metadata["intent"], "timer.set");
            assert_eq!(result.metadata["stages"]["asr"], false);
            assert_eq!(result.started_action_domains(), vec!["timer"]);
        }

        #[tokio::test]
        async fn empty_text_is_rejected() {
            let workflow = workflow_with(vec![]).await;
            let result = workflow.process_text("   ", text_request(false)).await;
            assert_eq!(result.error.as_deref(), Some("validation_failed"));
        }

        #[tokio::test]
        async fn speaks_only_when_audio_wanted() {
            let speaker = Arc::new(RecordingSpeaker::default());
            let workflow = workflow_with(vec![
                (TTS, Component::Synthesizer(Arc::new(ToneSynth))),
                (AUDIO, Component::AudioOutput(speaker.clone())),
            ])
            .await;

            let quiet = workflow.process_text("hello there", text_request(false)).await;
            assert_eq!(quiet.metadata["audio_played"], false);
            let loud = workflow.process_text("hello there", text_request(true)).await;
            assert_eq!(loud.metadata["audio_played"], true);
            assert_eq!(speaker.played.lock().unwrap().len(), 1);
        }
    }

    mod audio {
        use super::*;

        fn chunk(text: &str) -> AudioChunk {
            AudioChunk::new(text.as_bytes().to_vec(), 16_000)
        }

        #[tokio::test]
        async fn waits_for_wake_word_before_transcribing() {
            let workflow = Arc::new(
                workflow_with(vec![
                    (ASR, Component::Transcriber(Arc::new(EchoTranscriber))),
                    (VOICE_TRIGGER, Component::WakeWord(Arc::new(MagicWord))),
                ])
                .await,
            );
            let request = RequestContext::audio(
                SessionId::new("kitchen").unwrap(),
                false,
                false,
                ClientContext::default(),
            );
            let audio = stream::iter(vec![
                chunk("cancel the timer"),
                chunk("computer"),
                chunk("hello there"),
                chunk("goodbye"),
            ])
            .boxed();

            let results: Vec<IntentResult> = workflow.process_audio_stream(audio, request).collect().await;
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].metadata["intent"], "conversation.general");
        }

        #[tokio::test]
        async fn skipping_wake_word_transcribes_every_chunk() {
            let workflow = Arc::new(
                workflow_with(vec![(ASR, Component::Transcriber(Arc::new(EchoTranscriber)))]).await,
            );
            let request = RequestContext::audio(
                SessionId::new("kitchen").unwrap(),
                true,
                false,
                ClientContext::default(),
            );
            let audio = stream::iter(vec![chunk("hello there"), chunk(""), chunk("cancel the timer")]).boxed();

            let results: Vec<IntentResult> = workflow.process_audio_stream(audio, request).collect().await;
            assert_eq!(results.len(), 2);
            assert_eq!(results[1].metadata["intent"], "timer.cancel");
        }
    }
}
