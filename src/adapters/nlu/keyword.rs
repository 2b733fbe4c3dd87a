//! Keyword recognizer - maps phrases to intent names.
//!
//! A phrase matches when its words appear as a contiguous run of whole words
//! in the input. Phrases are tried in registration order. Durations such as
//! "5 minutes" or "an hour and 30 seconds" are extracted into a `duration`
//! entity (seconds). Unmatched text yields the recognition fallback intent.

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::domain::foundation::SessionId;
use crate::domain::intent::Intent;
use crate::ports::{IntentRecognizer, ProviderComponent, ProviderError};

const MATCH_CONFIDENCE: f64 = 0.9;

static DEFAULT_PHRASES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("cancel the timer", "timer.cancel"),
        ("cancel my timer", "timer.cancel"),
        ("stop the timer", "timer.cancel"),
        ("set a timer", "timer.set"),
        ("start a timer", "timer.set"),
        ("timer for", "timer.set"),
        ("let's talk", "conversation.start"),
        ("let's chat", "conversation.start"),
        ("clear the conversation", "conversation.clear"),
        ("forget everything", "conversation.clear"),
        ("goodbye", "conversation.end"),
        ("bye", "conversation.end"),
        ("that's all", "conversation.end"),
    ]
});

struct Phrase {
    words: Vec<String>,
    intent: String,
}

pub struct KeywordRecognizer {
    phrases: Vec<Phrase>,
    available: bool,
}

impl KeywordRecognizer {
    /// A recognizer with no phrases; everything falls back.
    pub fn new() -> Self {
        Self {
            phrases: Vec::new(),
            available: true,
        }
    }

    /// Timer and conversation phrases.
    pub fn with_default_phrases() -> Self {
        DEFAULT_PHRASES
            .iter()
            .fold(Self::new(), |recognizer, (phrase, intent)| recognizer.with_phrase(*phrase, *intent))
    }

    pub fn with_phrase(mut self, phrase: &str, intent: impl Into<String>) -> Self {
        let words = tokenize(phrase);
        if !words.is_empty() {
            self.phrases.push(Phrase {
                words,
                intent: intent.into(),
            });
        }
        self
    }

    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    fn match_phrase(&self, tokens: &[String]) -> Option<&str> {
        self.phrases
            .iter()
            .find(|phrase| {
                tokens
                    .windows(phrase.words.len())
                    .any(|window| window == phrase.words.as_slice())
            })
            .map(|phrase| phrase.intent.as_str())
    }
}

impl Default for KeywordRecognizer {
    fn default() -> Self {
        Self::with_default_phrases()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn unit_secs(word: &str) -> Option<u64> {
    match word {
        "second" | "seconds" | "sec" | "secs" => Some(1),
        "minute" | "minutes" | "min" | "mins" => Some(60),
        "hour" | "hours" => Some(3600),
        _ => None,
    }
}

/// Sums every `<amount> <unit>` pair in the input.
fn duration_secs(tokens: &[String]) -> Option<u64> {
    let mut total = 0u64;
    let mut found = false;
    for pair in tokens.windows(2) {
        let amount = match pair[0].as_str() {
            "a" | "an" | "one" => Some(1),
            word => word.parse::<u64>().ok(),
        };
        if let (Some(amount), Some(unit)) = (amount, unit_secs(&pair[1])) {
            total = total.saturating_add(amount.saturating_mul(unit));
            found = true;
        }
    }
    found.then_some(total)
}

impl ProviderComponent for KeywordRecognizer {
    fn name(&self) -> &str {
        "keyword_recognizer"
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

#[async_trait]
impl IntentRecognizer for KeywordRecognizer {
    async fn recognize(
        &self,
        text: &str,
        session_id: &SessionId,
        _language: &str,
    ) -> Result<Intent, ProviderError> {
        if !self.available {
            return Err(ProviderError::Unavailable(self.name().to_string()));
        }

        let tokens = tokenize(text);
        let Some(name) = self.match_phrase(&tokens) else {
            tracing::trace!(session_id = %session_id, "No keyword matched");
            return Ok(Intent::recognition_fallback(text, session_id.clone()));
        };

        let mut intent = Intent::new(name, text, session_id.clone())
            .map_err(|e| ProviderError::Failed(e.to_string()))?
            .with_confidence(MATCH_CONFIDENCE);
        if let Some(secs) = duration_secs(&tokens) {
            intent = intent.with_entity("duration", secs);
        }
        Ok(intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::new("den").unwrap()
    }

    async fn recognize(text: &str) -> Intent {
        KeywordRecognizer::with_default_phrases()
            .recognize(text, &session(), "en")
            .await
            .unwrap()
    }

    mod phrases {
        use super::*;

        #[tokio::test]
        async fn matches_whole_words_only() {
            assert_eq!(recognize("Goodbye!").await.name(), "conversation.end");
            assert!(recognize("a byelaw question").await.is_recognition_fallback());
        }

        #[tokio::test]
        async fn earlier_phrase_wins() {
            let intent = recognize("please cancel the timer for the oven").await;
            assert_eq!(intent.name(), "timer.cancel");
        }

        #[tokio::test]
        async fn unmatched_text_falls_back() {
            let intent = recognize("what's the weather like").await;
            assert!(intent.is_recognition_fallback());
            assert_eq!(intent.raw_text(), "what's the weather like");
        }

        #[tokio::test]
        async fn custom_phrases_are_matched() {
            let recognizer = KeywordRecognizer::new().with_phrase("lights on", "lights.on");
            let intent = recognizer.recognize("turn the Lights On", &session(), "en").await.unwrap();
            assert_eq!(intent.name(), "lights.on");
            assert_eq!(intent.domain(), "lights");
        }

        #[tokio::test]
        async fn unavailable_recognizer_errors() {
            let recognizer = KeywordRecognizer::with_default_phrases().with_availability(false);
            assert!(recognizer.recognize("bye", &session(), "en").await.is_err());
        }
    }

    mod durations {
        use super::*;

        #[tokio::test]
        async fn extracts_duration_in_seconds() {
            let intent = recognize("set a timer for 5 minutes").await;
            assert_eq!(intent.name(), "timer.set");
            assert_eq!(intent.entity("duration"), Some(&serde_json::json!(300)));
        }

        #[test]
        fn sums_mixed_units() {
            let tokens = tokenize("an hour and 30 seconds");
            assert_eq!(duration_secs(&tokens), Some(3630));
        }

        #[test]
        fn no_units_means_no_duration() {
            assert_eq!(duration_secs(&tokenize("set a timer")), None);
        }
    }
}
