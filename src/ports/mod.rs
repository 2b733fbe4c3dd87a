//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the core and the outside world. Adapters implement these ports.
//!
//! ## Provider Ports
//!
//! - `ProviderComponent` - Availability and load progress shared by all providers
//! - `IntentRecognizer` - NLU
//! - `SpeechTranscriber`, `SpeechSynthesizer`, `WakeWordDetector`, `AudioPlayer` - speech I/O
//! - `TextProcessor`, `ResponseGenerator` - text normalization and LLM replies
//!
//! ## Asset and Notification Ports
//!
//! - `PatternSource` - Per-handler routing tables from the donation loader
//! - `ActionNotifier` - Delivery of fire-and-forget action notices

mod action_notifier;
mod intent_recognizer;
mod pattern_source;
mod provider;
mod speech;
mod text;

pub use action_notifier::{ActionNotification, ActionNotifier, NotificationKind};
pub use intent_recognizer::IntentRecognizer;
pub use pattern_source::PatternSource;
pub use provider::{ProviderComponent, ProviderError};
pub use speech::{
    AudioChunk, AudioPlayer, SpeechSynthesizer, SpeechTranscriber, WakeWordDetector,
    WakeWordResult,
};
pub use text::{ResponseGenerator, TextProcessor};
