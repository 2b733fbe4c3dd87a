//! Pipeline module - which processing stages a request needs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::conversation::ClientContext;
use crate::domain::foundation::SessionId;

/// The fixed processing stages of the voice pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    VoiceTrigger,
    Asr,
    TextProcessing,
    Nlu,
    IntentExecution,
    Tts,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 6] = [
        PipelineStage::VoiceTrigger,
        PipelineStage::Asr,
        PipelineStage::TextProcessing,
        PipelineStage::Nlu,
        PipelineStage::IntentExecution,
        PipelineStage::Tts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::VoiceTrigger => "voice_trigger",
            PipelineStage::Asr => "asr",
            PipelineStage::TextProcessing => "text_processing",
            PipelineStage::Nlu => "nlu",
            PipelineStage::IntentExecution => "intent_execution",
            PipelineStage::Tts => "tts",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    Text,
    Microphone,
    Voice,
    AudioStream,
    Web,
    Api,
}

/// Per-request metadata that drives stage selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub source: RequestSource,
    pub session_id: SessionId,
    pub skip_wake_word: bool,
    pub wants_audio: bool,
    #[serde(default)]
    pub client: ClientContext,
}

impl RequestContext {
    /// Context for typed input: no wake word, no ASR.
    pub fn text(session_id: SessionId, wants_audio: bool, client: ClientContext) -> Self {
        Self {
            source: RequestSource::Text,
            session_id,
            skip_wake_word: true,
            wants_audio,
            client,
        }
    }

    /// Context for streamed audio; a stream that skips the wake word is an
    /// `audio_stream` source, otherwise a `voice` one.
    pub fn audio(
        session_id: SessionId,
        skip_wake_word: bool,
        wants_audio: bool,
        client: ClientContext,
    ) -> Self {
        Self {
            source: if skip_wake_word {
                RequestSource::AudioStream
            } else {
                RequestSource::Voice
            },
            session_id,
            skip_wake_word,
            wants_audio,
            client,
        }
    }
}

/// Stage switches of a pipeline.
pub type StageTable = BTreeMap<PipelineStage, bool>;

/// A table with every stage enabled.
pub fn all_stages_enabled() -> StageTable {
    PipelineStage::ALL.iter().map(|s| (*s, true)).collect()
}

/// Computes which stages run for a request.
///
/// Request rules only ever disable stages: the wake word is skipped for text
/// input or when asked, ASR is skipped for text input, and TTS is skipped when
/// the caller does not want audio. Stages missing from `defaults` count as
/// enabled.
pub fn configure_pipeline_stages(defaults: &StageTable, request: &RequestContext) -> StageTable {
    let is_text = request.source == RequestSource::Text;
    PipelineStage::ALL
        .iter()
        .map(|stage| {
            let default = defaults.get(stage).copied().unwrap_or(true);
            let disabled = match stage {
                PipelineStage::VoiceTrigger => request.skip_wake_word || is_text,
                PipelineStage::Asr => is_text,
                PipelineStage::Tts => !request.wants_audio,
                _ => false,
            };
            (*stage, default && !disabled)
        })
        .collect()
}
