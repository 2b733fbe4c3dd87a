//! Workflow configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::pipeline::{PipelineStage, StageTable};

/// Which workflows run and how their warm-up is watched
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorkflowsConfig {
    /// Workflows initialized at startup
    #[serde(default = "default_enabled")]
    pub enabled: Vec<String>,

    /// Workflow activated after startup and bootstrapped on demand
    #[serde(default = "default_workflow")]
    pub default_workflow: String,

    /// Progress monitor poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub progress_poll_interval_ms: u64,

    /// Default stage switches, before per-request rules apply
    #[serde(default)]
    pub stages: StagesConfig,
}

impl WorkflowsConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.enabled.is_empty() {
            return Err(ValidationError::NoWorkflowsEnabled);
        }
        if !self.enabled.contains(&self.default_workflow) {
            return Err(ValidationError::DefaultWorkflowNotEnabled(
                self.default_workflow.clone(),
            ));
        }
        if self.progress_poll_interval_ms == 0 {
            return Err(ValidationError::InvalidPollInterval);
        }
        Ok(())
    }
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            default_workflow: default_workflow(),
            progress_poll_interval_ms: default_poll_interval(),
            stages: StagesConfig::default(),
        }
    }
}

/// Default on/off switch per pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct StagesConfig {
    #[serde(default = "enabled")]
    pub voice_trigger: bool,
    #[serde(default = "enabled")]
    pub asr: bool,
    #[serde(default = "enabled")]
    pub text_processing: bool,
    #[serde(default = "enabled")]
    pub nlu: bool,
    #[serde(default = "enabled")]
    pub intent_execution: bool,
    #[serde(default = "enabled")]
    pub tts: bool,
}

impl StagesConfig {
    pub fn to_table(&self) -> StageTable {
        [
            (PipelineStage::VoiceTrigger, self.voice_trigger),
            (PipelineStage::Asr, self.asr),
            (PipelineStage::TextProcessing, self.text_processing),
            (PipelineStage::Nlu, self.nlu),
            (PipelineStage::IntentExecution, self.intent_execution),
            (PipelineStage::Tts, self.tts),
        ]
        .into_iter()
        .collect()
    }
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            voice_trigger: true,
            asr: true,
            text_processing: true,
            nlu: true,
            intent_execution: true,
            tts: true,
        }
    }
}

fn enabled() -> bool {
    true
}

fn default_enabled() -> Vec<String> {
    vec![default_workflow()]
}

fn default_workflow() -> String {
    "voice_assistant".to_string()
}

fn default_poll_interval() -> u64 {
    2000
}
