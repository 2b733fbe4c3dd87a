//! In-memory pattern source.
//!
//! Holds one `PatternTable` per handler name. Every insert or removal bumps
//! the generation so dispatchers re-read their snapshot on the next call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::intent::PatternTable;
use crate::ports::PatternSource;

#[derive(Default)]
pub struct InMemoryPatternSource {
    tables: RwLock<HashMap<String, Arc<PatternTable>>>,
    generation: AtomicU64,
}

impl InMemoryPatternSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, handler: impl Into<String>, table: PatternTable) -> Self {
        self.insert(handler, table);
        self
    }

    /// Parses a JSON object of handler name to pattern table.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let tables: HashMap<String, PatternTable> = serde_json::from_str(json)?;
        let source = Self::new();
        for (handler, table) in tables {
            source.insert(handler, table);
        }
        Ok(source)
    }

    /// Loads or replaces a handler's table.
    pub fn insert(&self, handler: impl Into<String>, table: PatternTable) {
        let handler = handler.into();
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handler.clone(), Arc::new(table));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(handler = %handler, generation, "Pattern table loaded");
    }

    /// Unloads a handler's table. Returns whether one was loaded.
    pub fn remove(&self, handler: &str) -> bool {
        let removed = self
            .tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handler)
            .is_some();
        if removed {
            self.generation.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(handler, "Pattern table unloaded");
        }
        removed
    }

    pub fn handlers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl PatternSource for InMemoryPatternSource {
    fn pattern_table(&self, handler: &str) -> Option<Arc<PatternTable>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handler)
            .cloned()
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_bumps_generation() {
        let source = InMemoryPatternSource::new();
        assert_eq!(source.generation(), 0);

        source.insert("timer", PatternTable::new().with_domain("timer"));
        let first = source.generation();
        source.insert("timer", PatternTable::new().with_domain("alarm"));

        assert!(source.generation() > first);
        assert_eq!(
            source.pattern_table("timer").unwrap().domain_patterns,
            vec!["alarm".to_string()]
        );
    }

    #[test]
    fn removing_unknown_handler_keeps_generation() {
        let source = InMemoryPatternSource::new().with_table("timer", PatternTable::new());
        let generation = source.generation();

        assert!(!source.remove("weather"));
        assert_eq!(source.generation(), generation);
        assert!(source.remove("timer"));
        assert!(source.pattern_table("timer").is_none());
    }

    #[test]
    fn parses_tables_from_json() {
        let table = PatternTable::new()
            .with_domain("timer")
            .with_method("set_timer", "set");
        let json = serde_json::json!({ "timer": table }).to_string();

        let source = InMemoryPatternSource::from_json(&json).unwrap();

        assert_eq!(source.handlers(), vec!["timer"]);
        let loaded = source.pattern_table("timer").unwrap();
        assert_eq!(loaded.method_names(), vec!["set_timer"]);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(InMemoryPatternSource::from_json("{\"timer\": 3}").is_err());
    }
}
