//! Speech Ports - ASR, TTS, wake word and audio output.
//!
//! The algorithms behind these ports live outside this crate; the pipeline
//! only needs to hand audio in and get text (or audio) out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ProviderComponent, ProviderError};

/// One chunk of captured PCM audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>, sample_rate: u32) -> Self {
        Self {
            data,
            sample_rate,
            channels: 1,
        }
    }
}

/// Outcome of wake-word detection on one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeWordResult {
    pub detected: bool,
    pub word: Option<String>,
    pub confidence: f64,
}

impl WakeWordResult {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            word: None,
            confidence: 0.0,
        }
    }
}

/// Speech-to-text.
#[async_trait]
pub trait SpeechTranscriber: ProviderComponent {
    /// Returns the transcript, or an empty string when the chunk held no speech.
    async fn transcribe(&self, audio: &AudioChunk, language: &str) -> Result<String, ProviderError>;
}

/// Text-to-speech.
#[async_trait]
pub trait SpeechSynthesizer: ProviderComponent {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Vec<u8>, ProviderError>;
}

#[async_trait]
pub trait WakeWordDetector: ProviderComponent {
    async fn detect(&self, audio: &AudioChunk) -> Result<WakeWordResult, ProviderError>;
}

#[async_trait]
pub trait AudioPlayer: ProviderComponent {
    async fn play(&self, audio: &[u8]) -> Result<(), ProviderError>;
}
