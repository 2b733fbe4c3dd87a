//! Adapters - Implementations of port interfaces.
//!
//! - `donations` - pattern table sources (in-memory)
//! - `components` - component registries for workflow injection (in-memory)
//! - `nlu` - keyword-based intent recognizer
//! - `notifications` - action notifiers (logging)

pub mod components;
pub mod donations;
pub mod nlu;
pub mod notifications;

pub use components::InMemoryComponentRegistry;
pub use donations::InMemoryPatternSource;
pub use nlu::KeywordRecognizer;
pub use notifications::LoggingNotifier;
