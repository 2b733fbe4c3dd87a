//! Dispatch configuration

use serde::Deserialize;

/// Handler registration settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DispatchConfig {
    /// Refuse to register a handler whose pattern table names a method it
    /// does not bind
    #[serde(default)]
    pub strict_method_binding: bool,
}
