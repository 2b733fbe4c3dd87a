//! Result of handling an intent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Intent;
use crate::domain::foundation::{ErrorCode, Timestamp};

/// Outcome returned to the caller for one processed request.
///
/// `action_metadata` carries the description of any fire-and-forget actions
/// started while producing this result (`{"active_actions": {domain: {...}}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub text: String,
    pub should_speak: bool,
    pub metadata: Map<String, Value>,
    pub action_metadata: Map<String, Value>,
    pub success: bool,
    pub error: Option<String>,
    pub confidence: f64,
    pub timestamp: Timestamp,
}

impl IntentResult {
    /// Successful result that should be spoken.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            should_speak: true,
            metadata: Map::new(),
            action_metadata: Map::new(),
            success: true,
            error: None,
            confidence: 1.0,
            timestamp: Timestamp::now(),
        }
    }

    /// Failed result carrying a machine-readable error code.
    pub fn failure(text: impl Into<String>, code: ErrorCode) -> Self {
        let mut metadata = Map::new();
        metadata.insert("error_type".to_string(), Value::String(code.as_str().to_string()));
        Self {
            text: text.into(),
            should_speak: true,
            metadata,
            action_metadata: Map::new(),
            success: false,
            error: Some(code.as_str().to_string()),
            confidence: 0.0,
            timestamp: Timestamp::now(),
        }
    }

    /// Failed result for an intent, recording the intent name and error details.
    pub fn failure_for(
        text: impl Into<String>,
        code: ErrorCode,
        intent: &Intent,
        details: impl Into<String>,
    ) -> Self {
        Self::failure(text, code)
            .with_metadata("original_intent", intent.name())
            .with_metadata("error_details", details.into())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merges action metadata, combining `active_actions` maps key by key.
    pub fn with_action_metadata(mut self, action_metadata: Map<String, Value>) -> Self {
        self.merge_action_metadata(action_metadata);
        self
    }

    pub fn merge_action_metadata(&mut self, action_metadata: Map<String, Value>) {
        for (key, value) in action_metadata {
            match (self.action_metadata.get_mut(&key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    existing.extend(incoming);
                }
                (_, value) => {
                    self.action_metadata.insert(key, value);
                }
            }
        }
    }

    pub fn with_should_speak(mut self, should_speak: bool) -> Self {
        self.should_speak = should_speak;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Domains named under `action_metadata.active_actions`.
    pub fn started_action_domains(&self) -> Vec<String> {
        match self.action_metadata.get("active_actions") {
            Some(Value::Object(actions)) => actions.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::SessionId;
    use serde_json::json;

    #[test]
    fn success_result_speaks_and_has_no_error() {
        let result = IntentResult::success("Done");
        assert!(result.success);
        assert!(result.should_speak);
        assert!(result.error.is_none());
    }

    #[test]
    fn failure_for_records_code_and_intent() {
        let intent = Intent::new("timer.snooze", "snooze", SessionId::default()).unwrap();
        let result = IntentResult::failure_for(
            "Sorry",
            ErrorCode::MethodNotFound,
            &intent,
            "no method for suffix 'snooze'",
        );
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("method_not_found"));
        assert_eq!(result.metadata["error_type"], json!("method_not_found"));
        assert_eq!(result.metadata["original_intent"], json!("timer.snooze"));
    }

    #[test]
    fn action_metadata_merges_active_actions() {
        let first = json!({"active_actions": {"timer": {"status": "running"}}});
        let second = json!({"active_actions": {"audio": {"status": "running"}}});
        let result = IntentResult::success("ok")
            .with_action_metadata(first.as_object().cloned().unwrap())
            .with_action_metadata(second.as_object().cloned().unwrap());

        let mut domains = result.started_action_domains();
        domains.sort();
        assert_eq!(domains, vec!["audio".to_string(), "timer".to_string()]);
    }
}
