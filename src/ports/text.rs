//! Text Ports - normalization and free-form response generation.

use async_trait::async_trait;

use super::{ProviderComponent, ProviderError};
use crate::domain::conversation::DialogueTurn;

/// Normalizes raw text (numbers, punctuation, casing) before NLU.
#[async_trait]
pub trait TextProcessor: ProviderComponent {
    async fn normalize(&self, text: &str, language: &str) -> Result<String, ProviderError>;
}

/// Generates a conversational reply (typically backed by an LLM).
#[async_trait]
pub trait ResponseGenerator: ProviderComponent {
    /// Produces the assistant's next turn given the dialogue so far.
    async fn generate(&self, turns: &[DialogueTurn], language: &str) -> Result<String, ProviderError>;
}
