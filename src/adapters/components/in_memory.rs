//! In-memory component registry.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::application::workflow::{Component, ComponentRegistry};

/// Components registered up front by the host, listed in name order.
#[derive(Default)]
pub struct InMemoryComponentRegistry {
    components: RwLock<BTreeMap<String, Component>>,
}

impl InMemoryComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(self, name: impl Into<String>, component: Component) -> Self {
        self.register(name, component);
        self
    }

    /// Adds or replaces a component. Only workflows built afterwards see it.
    pub fn register(&self, name: impl Into<String>, component: Component) {
        let name = name.into();
        tracing::debug!(component = %name, kind = component.kind(), "Component registered");
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, component);
    }

    pub fn unregister(&self, name: &str) -> Option<Component> {
        self.components
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }
}

impl ComponentRegistry for InMemoryComponentRegistry {
    fn components(&self) -> Vec<(String, Component)> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, component)| (name.clone(), component.clone()))
            .collect()
    }

    fn component(&self, name: &str) -> Option<Component> {
        self.components
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}
