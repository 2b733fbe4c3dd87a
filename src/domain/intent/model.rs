//! Recognized intent value object.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::foundation::{SessionId, Timestamp, ValidationError};

/// Domain assigned to intent names that carry no `.` separator.
pub const GENERAL_DOMAIN: &str = "general";

/// Intent name produced when recognition fails.
pub const FALLBACK_INTENT_NAME: &str = "conversation.general";

/// Entity flag set on intents built by [`Intent::recognition_fallback`].
pub const RECOGNITION_FAILED_ENTITY: &str = "recognition_failed";

/// A normalized representation of what the user wants.
///
/// `domain` and `action` are derived from `name` (`"timer.set"` gives
/// domain `timer`, action `set`) unless set explicitly while building.
/// Once built an Intent is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    name: String,
    domain: String,
    action: String,
    entities: HashMap<String, Value>,
    confidence: f64,
    raw_text: String,
    session_id: SessionId,
    timestamp: Timestamp,
}

impl Intent {
    /// Creates an intent with confidence 1.0 and no entities.
    pub fn new(
        name: impl Into<String>,
        raw_text: impl Into<String>,
        session_id: SessionId,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::empty_field("intent_name"));
        }
        let (domain, action) = split_name(&name);
        Ok(Self {
            domain,
            action,
            name,
            entities: HashMap::new(),
            confidence: 1.0,
            raw_text: raw_text.into(),
            session_id,
            timestamp: Timestamp::now(),
        })
    }

    /// Builds the general-conversation intent used when NLU cannot match text.
    pub fn recognition_fallback(raw_text: impl Into<String>, session_id: SessionId) -> Self {
        let raw_text = raw_text.into();
        let (domain, action) = split_name(FALLBACK_INTENT_NAME);
        let mut entities = HashMap::new();
        entities.insert("original_text".to_string(), Value::String(raw_text.clone()));
        entities.insert(RECOGNITION_FAILED_ENTITY.to_string(), Value::Bool(true));
        Self {
            name: FALLBACK_INTENT_NAME.to_string(),
            domain,
            action,
            entities,
            confidence: 1.0,
            raw_text,
            session_id,
            timestamp: Timestamp::now(),
        }
    }

    /// Overrides the derived domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Overrides the derived action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    /// Adds an entity; a repeated key replaces the earlier value.
    pub fn with_entity(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entities.insert(key.into(), value.into());
        self
    }

    /// Sets the recognition confidence, clamped to `[0, 1]`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn entities(&self) -> &HashMap<String, Value> {
        &self.entities
    }

    pub fn entity(&self, key: &str) -> Option<&Value> {
        self.entities.get(key)
    }

    /// Returns a string entity, if present and a string.
    pub fn entity_str(&self, key: &str) -> Option<&str> {
        self.entities.get(key).and_then(Value::as_str)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    /// Text after the first `.` of the name, if the name has one.
    pub fn suffix(&self) -> Option<&str> {
        self.name.split_once('.').map(|(_, rest)| rest)
    }

    /// True for intents built by [`Intent::recognition_fallback`].
    pub fn is_recognition_fallback(&self) -> bool {
        matches!(self.entity(RECOGNITION_FAILED_ENTITY), Some(Value::Bool(true)))
    }
}

fn split_name(name: &str) -> (String, String) {
    match name.split_once('.') {
        Some((domain, action)) => (domain.to_string(), action.to_string()),
        None => (GENERAL_DOMAIN.to_string(), name.to_string()),
    }
}
