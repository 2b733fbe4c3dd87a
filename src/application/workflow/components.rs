//! Named components injected into workflows.

use std::fmt;
use std::sync::Arc;

use crate::application::dispatch::IntentOrchestrator;
use crate::application::sessions::SessionRegistry;
use crate::config::AppConfig;
use crate::domain::workflow::LoadProgress;
use crate::ports::{
    AudioPlayer, IntentRecognizer, ProviderComponent, ResponseGenerator, SpeechSynthesizer,
    SpeechTranscriber, TextProcessor, WakeWordDetector,
};

pub const NLU: &str = "nlu";
pub const ASR: &str = "asr";
pub const TTS: &str = "tts";
pub const VOICE_TRIGGER: &str = "voice_trigger";
pub const AUDIO: &str = "audio";
pub const TEXT_PROCESSOR: &str = "text_processor";
pub const LLM: &str = "llm";
pub const INTENT_ORCHESTRATOR: &str = "intent_orchestrator";
pub const CONTEXT_MANAGER: &str = "context_manager";
pub const CONFIG: &str = "config";

/// Applies `$call` to the provider inside a component, or yields `$default`
/// for components that are not providers.
macro_rules! on_provider {
    ($component:expr, $p:ident => $call:expr, $default:expr) => {
        match $component {
            Component::Recognizer($p) => $call,
            Component::Transcriber($p) => $call,
            Component::Synthesizer($p) => $call,
            Component::WakeWord($p) => $call,
            Component::AudioOutput($p) => $call,
            Component::TextProcessor($p) => $call,
            Component::Generator($p) => $call,
            Component::Orchestrator(_) | Component::Sessions(_) | Component::Config(_) => $default,
        }
    };
}

/// A component a workflow can be given.
#[derive(Clone)]
pub enum Component {
    Recognizer(Arc<dyn IntentRecognizer>),
    Transcriber(Arc<dyn SpeechTranscriber>),
    Synthesizer(Arc<dyn SpeechSynthesizer>),
    WakeWord(Arc<dyn WakeWordDetector>),
    AudioOutput(Arc<dyn AudioPlayer>),
    TextProcessor(Arc<dyn TextProcessor>),
    Generator(Arc<dyn ResponseGenerator>),
    Orchestrator(Arc<IntentOrchestrator>),
    Sessions(Arc<SessionRegistry>),
    Config(Arc<AppConfig>),
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Recognizer(_) => "recognizer",
            Component::Transcriber(_) => "transcriber",
            Component::Synthesizer(_) => "synthesizer",
            Component::WakeWord(_) => "wake_word",
            Component::AudioOutput(_) => "audio_output",
            Component::TextProcessor(_) => "text_processor",
            Component::Generator(_) => "generator",
            Component::Orchestrator(_) => "orchestrator",
            Component::Sessions(_) => "sessions",
            Component::Config(_) => "config",
        }
    }

    /// Sub-provider load counts, for providers that load lazily.
    pub fn load_progress(&self) -> Option<LoadProgress> {
        on_provider!(self, p => p.load_progress(), None)
    }

    pub fn is_available(&self) -> bool {
        on_provider!(self, p => p.is_available(), true)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component::{}", self.kind())
    }
}

/// Source of the components available for injection.
pub trait ComponentRegistry: Send + Sync {
    /// Every available component, by name.
    fn components(&self) -> Vec<(String, Component)>;

    fn component(&self, name: &str) -> Option<Component>;
}
