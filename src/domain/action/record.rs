//! ActionRecord - bookkeeping for one fire-and-forget action run.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::FailureType;
use crate::domain::foundation::{ActionId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Running => "running",
            ActionStatus::Completed => "completed",
            ActionStatus::Failed => "failed",
            ActionStatus::Cancelled => "cancelled",
        }
    }
}

/// State of one action, owned by a single ConversationContext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: ActionId,
    pub domain: String,
    pub action_name: String,
    pub handler: String,
    pub started_at: Timestamp,
    pub status: ActionStatus,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub completed_at: Option<Timestamp>,
    pub success: Option<bool>,
    pub error: Option<String>,
    pub failure_type: Option<FailureType>,
    pub is_critical: Option<bool>,
    pub retry_count: u32,
    pub cancelled_at: Option<Timestamp>,
    pub cancellation_reason: Option<String>,
}

impl ActionRecord {
    /// New running record with a fresh identity.
    pub fn started(
        domain: impl Into<String>,
        action_name: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            action_id: ActionId::new(),
            domain: domain.into(),
            action_name: action_name.into(),
            handler: handler.into(),
            started_at: Timestamp::now(),
            status: ActionStatus::Running,
            metadata: Map::new(),
            completed_at: None,
            success: None,
            error: None,
            failure_type: None,
            is_critical: None,
            retry_count: 0,
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == ActionStatus::Running
    }

    /// Timestamp used for age-based retention.
    pub fn last_update(&self) -> Timestamp {
        self.completed_at
            .or(self.cancelled_at)
            .unwrap_or(self.started_at)
    }

    /// Seconds from start to completion, or to now while unfinished.
    pub fn duration_secs(&self) -> f64 {
        match self.completed_at {
            Some(done) => {
                let millis = done.duration_since(&self.started_at).num_milliseconds();
                (millis.max(0) as f64) / 1000.0
            }
            None => self.started_at.elapsed_secs(),
        }
    }

    /// Caller-visible description placed under `active_actions` in a result.
    pub fn to_action_metadata(&self) -> Value {
        json!({
            "action_id": self.action_id.to_string(),
            "handler": self.handler,
            "action": self.action_name,
            "domain": self.domain,
            "started_at": self.started_at.as_datetime().to_rfc3339(),
            "status": self.status.as_str(),
        })
    }
}
