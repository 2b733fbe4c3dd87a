//! Workflows - named processing pipelines and their lifecycle.
//!
//! - `Workflow` - one pipeline instance (components, init, request handling)
//! - `WorkflowRegistry` - constructors by name
//! - `WorkflowManager` - parallel init, activation, hot reload, status
//! - `ProgressMonitor` - background warm-up polling

mod components;
mod error;
mod manager;
mod monitor;
mod pipeline;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use components::{
    Component, ComponentRegistry, ASR, AUDIO, CONFIG, CONTEXT_MANAGER, INTENT_ORCHESTRATOR, LLM,
    NLU, TEXT_PROCESSOR, TTS, VOICE_TRIGGER,
};
pub use error::WorkflowError;
pub use manager::{InitializationSummary, WorkflowInfo, WorkflowManager, WorkflowStatus};
pub use monitor::ProgressMonitor;
pub use pipeline::{VoicePipelineWorkflow, VOICE_ASSISTANT};

use crate::config::WorkflowsConfig;
use crate::domain::intent::IntentResult;
use crate::domain::pipeline::{RequestContext, StageTable};
use crate::domain::workflow::LoadProgress;
use crate::ports::AudioChunk;

/// One named processing pipeline.
#[async_trait]
pub trait Workflow: Send + Sync {
    fn name(&self) -> &str;

    /// Records a component under `name`. Called before `initialize`.
    fn add_component(&mut self, name: &str, component: Component);

    fn component_names(&self) -> Vec<String>;

    async fn initialize(&mut self) -> Result<(), WorkflowError>;

    /// Loaded/total sub-providers across the workflow's components.
    fn load_progress(&self) -> LoadProgress;

    fn is_ready(&self) -> bool {
        self.load_progress().is_complete()
    }

    async fn process_text(&self, text: &str, request: RequestContext) -> IntentResult;

    fn process_audio_stream(
        self: Arc<Self>,
        audio: BoxStream<'static, AudioChunk>,
        request: RequestContext,
    ) -> BoxStream<'static, IntentResult>;

    /// Releases whatever `initialize` acquired.
    async fn cleanup(&self);
}

/// Manager-wide workflow settings.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    pub enabled: Vec<String>,
    pub default_workflow: String,
    pub progress_poll_interval: Duration,
    pub stages: StageTable,
}

impl From<&WorkflowsConfig> for WorkflowSettings {
    fn from(config: &WorkflowsConfig) -> Self {
        Self {
            enabled: config.enabled.clone(),
            default_workflow: config.default_workflow.clone(),
            progress_poll_interval: Duration::from_millis(config.progress_poll_interval_ms),
            stages: config.stages.to_table(),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from(&WorkflowsConfig::default())
    }
}

/// Builds a fresh workflow instance named `name`.
pub type WorkflowConstructor =
    Arc<dyn Fn(&str, &WorkflowSettings) -> Box<dyn Workflow> + Send + Sync>;

/// Workflow constructors by name.
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    constructors: HashMap<String, WorkflowConstructor>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the voice pipeline registered as `voice_assistant`.
    pub fn with_voice_pipeline() -> Self {
        Self::new().with(
            VOICE_ASSISTANT,
            Arc::new(|name: &str, settings: &WorkflowSettings| {
                Box::new(VoicePipelineWorkflow::new(name, settings.stages.clone())) as Box<dyn Workflow>
            }),
        )
    }

    pub fn register(&mut self, name: impl Into<String>, constructor: WorkflowConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn with(mut self, name: impl Into<String>, constructor: WorkflowConstructor) -> Self {
        self.register(name, constructor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn create(
        &self,
        name: &str,
        settings: &WorkflowSettings,
    ) -> Result<Box<dyn Workflow>, WorkflowError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| WorkflowError::UnknownWorkflow(name.to_string()))?;
        Ok(constructor(name, settings))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_workflow_is_an_error() {
        let registry = WorkflowRegistry::with_voice_pipeline();
        let err = registry.create("karaoke", &WorkflowSettings::default()).err();
        assert_eq!(err, Some(WorkflowError::UnknownWorkflow("karaoke".into())));
    }

    #[test]
    fn voice_pipeline_is_registered_under_its_name() {
        let registry = WorkflowRegistry::with_voice_pipeline();
        assert_eq!(registry.names(), vec![VOICE_ASSISTANT.to_string()]);
        let workflow = registry.create(VOICE_ASSISTANT, &WorkflowSettings::default()).unwrap();
        assert_eq!(workflow.name(), VOICE_ASSISTANT);
    }

    #[test]
    fn settings_follow_config() {
        let settings = WorkflowSettings::default();
        assert_eq!(settings.default_workflow, "voice_assistant");
        assert_eq!(settings.progress_poll_interval, Duration::from_millis(2000));
        assert!(settings.stages.values().all(|enabled| *enabled));
    }
}
