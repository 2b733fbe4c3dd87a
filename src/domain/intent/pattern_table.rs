//! Declarative per-handler routing data.
//!
//! A PatternTable is handed to the core by an external asset loader and is
//! never modified here.

use serde::{Deserialize, Serialize};

use super::Intent;

/// Domain-scoped low-confidence catch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackCondition {
    pub domain: String,
    pub confidence_threshold: f64,
}

/// Binds an intent suffix to a handler method name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub method_name: String,
    pub intent_suffix: String,
}

/// Which check of [`PatternTable::match_intent`] accepted an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Domain,
    IntentName,
    Action,
    Fallback,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternTable {
    #[serde(default)]
    pub domain_patterns: Vec<String>,
    #[serde(default)]
    pub intent_name_patterns: Vec<String>,
    #[serde(default)]
    pub action_patterns: Vec<String>,
    #[serde(default)]
    pub fallback_conditions: Vec<FallbackCondition>,
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain_patterns.push(domain.into());
        self
    }

    pub fn with_intent_name(mut self, name: impl Into<String>) -> Self {
        self.intent_name_patterns.push(name.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action_patterns.push(action.into());
        self
    }

    pub fn with_fallback(mut self, domain: impl Into<String>, confidence_threshold: f64) -> Self {
        self.fallback_conditions.push(FallbackCondition {
            domain: domain.into(),
            confidence_threshold,
        });
        self
    }

    pub fn with_method(
        mut self,
        method_name: impl Into<String>,
        intent_suffix: impl Into<String>,
    ) -> Self {
        self.methods.push(MethodSpec {
            method_name: method_name.into(),
            intent_suffix: intent_suffix.into(),
        });
        self
    }

    /// Checks the intent against domain, name, action and fallback patterns in
    /// that order and reports the first that matches.
    pub fn match_intent(&self, intent: &Intent) -> Option<MatchKind> {
        if self.domain_patterns.iter().any(|d| d == intent.domain()) {
            return Some(MatchKind::Domain);
        }
        if self.intent_name_patterns.iter().any(|n| n == intent.name()) {
            return Some(MatchKind::IntentName);
        }
        if self.action_patterns.iter().any(|a| a == intent.action()) {
            return Some(MatchKind::Action);
        }
        let low_confidence = self.fallback_conditions.iter().any(|c| {
            c.domain == intent.domain() && intent.confidence() < c.confidence_threshold
        });
        if low_confidence {
            return Some(MatchKind::Fallback);
        }
        None
    }

    /// Method bound to the text after the first `.` of the intent name.
    pub fn resolve_method(&self, intent: &Intent) -> Option<&str> {
        intent.suffix().and_then(|suffix| self.method_for_suffix(suffix))
    }

    pub fn method_for_suffix(&self, suffix: &str) -> Option<&str> {
        self.methods
            .iter()
            .find(|m| m.intent_suffix == suffix)
            .map(|m| m.method_name.as_str())
    }

    /// Distinct method names in declaration order.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for spec in &self.methods {
            if !names.contains(&spec.method_name.as_str()) {
                names.push(&spec.method_name);
            }
        }
        names
    }
}
