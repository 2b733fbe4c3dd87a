//! Client metadata attached to a request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Room, device and client details supplied with a request.
///
/// Unknown keys are preserved in `extra` so adapters can pass through
/// whatever their transport carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientContext {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClientContext {
    pub fn for_room(room_id: impl Into<String>, room_name: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            room_name: Some(room_name.into()),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}
