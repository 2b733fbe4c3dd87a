//! WorkflowManager - owns named workflow instances and their lifecycle.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use super::components::ComponentRegistry;
use super::monitor::ProgressMonitor;
use super::{Workflow, WorkflowError, WorkflowRegistry, WorkflowSettings};
use crate::domain::conversation::ClientContext;
use crate::domain::foundation::{ErrorCode, SessionId, StateMachine};
use crate::domain::intent::IntentResult;
use crate::domain::pipeline::RequestContext;
use crate::domain::workflow::{LoadProgress, WorkflowState};
use crate::ports::AudioChunk;

const UNAVAILABLE_TEXT: &str = "The assistant is not available right now.";

pub(super) struct WorkflowSlot {
    pub(super) state: WorkflowState,
    pub(super) instance: Option<Arc<dyn Workflow>>,
    pub(super) error: Option<String>,
}

impl WorkflowSlot {
    fn initializing() -> Self {
        Self {
            state: WorkflowState::Initializing,
            instance: None,
            error: None,
        }
    }
}

#[derive(Default)]
pub(super) struct ManagerState {
    pub(super) slots: BTreeMap<String, WorkflowSlot>,
    pub(super) active: Option<String>,
}

/// Outcome of `WorkflowManager::initialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InitializationSummary {
    pub active: Option<String>,
    pub ready: Vec<String>,
    pub warming_up: Vec<String>,
    pub failed: Vec<String>,
}

/// Status of one named workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowInfo {
    pub state: WorkflowState,
    pub ready: bool,
    pub progress: LoadProgress,
    pub percent: f64,
    pub components: Vec<String>,
    pub error: Option<String>,
}

/// Snapshot returned by `WorkflowManager::status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStatus {
    pub active: Option<String>,
    pub workflows: BTreeMap<String, WorkflowInfo>,
    pub available: Vec<String>,
    pub overall_progress: f64,
}

/// Creates, initializes, activates and reloads workflows by name.
///
/// Request handling only reads the active instance; lifecycle operations
/// (initialize, on-demand creation, hot reload) are serialized.
pub struct WorkflowManager {
    registry: WorkflowRegistry,
    components: Arc<dyn ComponentRegistry>,
    settings: WorkflowSettings,
    state: Arc<RwLock<ManagerState>>,
    lifecycle: Mutex<()>,
    monitor: Mutex<Option<ProgressMonitor>>,
}

impl WorkflowManager {
    pub fn new(
        registry: WorkflowRegistry,
        components: Arc<dyn ComponentRegistry>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            registry,
            components,
            settings,
            state: Arc::new(RwLock::new(ManagerState::default())),
            lifecycle: Mutex::new(()),
            monitor: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ManagerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ManagerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds and initializes every enabled workflow, then activates the
    /// default one if it came up.
    ///
    /// A workflow that fails is marked `Error`; the others are unaffected.
    /// Only an empty enabled list is an error.
    pub async fn initialize(&self) -> Result<InitializationSummary, WorkflowError> {
        if self.settings.enabled.is_empty() {
            return Err(WorkflowError::InvalidConfiguration(
                "no workflows enabled".to_string(),
            ));
        }
        let _lifecycle = self.lifecycle.lock().await;

        let mut names: Vec<String> = Vec::new();
        for name in &self.settings.enabled {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        tracing::info!(workflows = ?names, "Initializing workflows");

        let mut pending = Vec::new();
        for name in &names {
            if let Some(workflow) = self.prepare(name) {
                pending.push((name.clone(), workflow));
            }
        }

        let outcomes = if pending.len() == 1 {
            let mut outcomes = Vec::with_capacity(1);
            for (name, mut workflow) in pending {
                let result = workflow.initialize().await;
                outcomes.push((name, workflow, result));
            }
            outcomes
        } else {
            let mut tasks = JoinSet::new();
            for (name, mut workflow) in pending {
                tasks.spawn(async move {
                    let result = workflow.initialize().await;
                    (name, workflow, result)
                });
            }
            let mut outcomes = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(err) => tracing::error!(error = %err, "Workflow initialization task aborted"),
                }
            }
            outcomes
        };

        for (name, workflow, result) in outcomes {
            self.settle(name, workflow, result).await;
        }

        let summary = {
            let mut state = self.write_state();
            for (name, slot) in state.slots.iter_mut() {
                if slot.state == WorkflowState::Initializing {
                    tracing::error!(workflow = %name, "Workflow never finished initializing");
                    slot.state = WorkflowState::Error;
                    slot.error = Some("initialization did not complete".to_string());
                }
            }

            let default = &self.settings.default_workflow;
            let default_usable = state
                .slots
                .get(default)
                .map_or(false, |slot| slot.state.is_usable());
            if default_usable {
                state.active = Some(default.clone());
            } else {
                tracing::warn!(workflow = %default, "Default workflow unavailable after initialization");
            }

            let mut summary = InitializationSummary {
                active: state.active.clone(),
                ..Default::default()
            };
            for (name, slot) in &state.slots {
                match slot.state {
                    WorkflowState::Ready => summary.ready.push(name.clone()),
                    WorkflowState::WarmingUp => summary.warming_up.push(name.clone()),
                    _ => summary.failed.push(name.clone()),
                }
            }
            summary
        };

        tracing::info!(
            active = ?summary.active,
            ready = ?summary.ready,
            warming_up = ?summary.warming_up,
            failed = ?summary.failed,
            "Workflow initialization finished"
        );
        self.ensure_monitor().await;
        Ok(summary)
    }

    /// Resets the slot to `Initializing`, constructs the workflow and injects
    /// every available component. A construction failure marks the slot.
    fn prepare(&self, name: &str) -> Option<Box<dyn Workflow>> {
        self.write_state()
            .slots
            .insert(name.to_string(), WorkflowSlot::initializing());

        match self.registry.create(name, &self.settings) {
            Ok(mut workflow) => {
                for (component_name, component) in self.components.components() {
                    workflow.add_component(&component_name, component);
                }
                Some(workflow)
            }
            Err(err) => {
                tracing::error!(workflow = %name, error = %err, "Workflow could not be constructed");
                self.fail_slot(name, err.to_string());
                None
            }
        }
    }

    /// Records an initialization outcome and returns the slot's new state.
    async fn settle(
        &self,
        name: String,
        workflow: Box<dyn Workflow>,
        result: Result<(), WorkflowError>,
    ) -> WorkflowState {
        if let Err(err) = result {
            tracing::error!(workflow = %name, error = %err, "Workflow initialization failed");
            workflow.cleanup().await;
            self.fail_slot(&name, err.to_string());
            return WorkflowState::Error;
        }

        let instance: Arc<dyn Workflow> = Arc::from(workflow);
        let ready = instance.is_ready();
        let mut state = self.write_state();
        let slot = state
            .slots
            .entry(name.clone())
            .or_insert_with(WorkflowSlot::initializing);

        let next = slot
            .state
            .transition_to(WorkflowState::WarmingUp)
            .and_then(|s| if ready { s.transition_to(WorkflowState::Ready) } else { Ok(s) });
        match next {
            Ok(next) => {
                slot.state = next;
                slot.instance = Some(instance);
                slot.error = None;
                tracing::info!(workflow = %name, state = %next, "Workflow initialized");
                next
            }
            Err(err) => {
                tracing::error!(workflow = %name, error = %err, "Workflow lifecycle transition rejected");
                slot.state = WorkflowState::Error;
                slot.error = Some(err.to_string());
                WorkflowState::Error
            }
        }
    }

    fn fail_slot(&self, name: &str, reason: String) {
        let mut state = self.write_state();
        let slot = state
            .slots
            .entry(name.to_string())
            .or_insert_with(WorkflowSlot::initializing);
        slot.state = WorkflowState::Error;
        slot.instance = None;
        slot.error = Some(reason);
        if state.active.as_deref() == Some(name) {
            state.active = None;
        }
    }

    async fn construct(&self, name: &str) -> WorkflowState {
        let Some(mut workflow) = self.prepare(name) else {
            return WorkflowState::Error;
        };
        let result = workflow.initialize().await;
        self.settle(name.to_string(), workflow, result).await
    }

    /// Starts the progress monitor when some workflow is still warming up
    /// and no monitor is running.
    async fn ensure_monitor(&self) {
        let warming = self
            .read_state()
            .slots
            .values()
            .any(|slot| slot.state == WorkflowState::WarmingUp);
        if !warming {
            return;
        }

        let mut monitor = self.monitor.lock().await;
        if monitor.as_ref().map_or(false, |m| !m.is_finished()) {
            return;
        }
        let interval = self.settings.progress_poll_interval.max(Duration::from_millis(1));
        *monitor = Some(ProgressMonitor::spawn(Arc::clone(&self.state), interval));
    }

    /// Makes `name` the active workflow. Fails if it is not initialized.
    pub fn switch_workflow(&self, name: &str) -> bool {
        let mut state = self.write_state();
        let usable = state.slots.get(name).map_or(false, |slot| slot.state.is_usable());
        if !usable {
            tracing::warn!(workflow = %name, "Cannot switch to workflow that is not initialized");
            return false;
        }
        let previous = state.active.replace(name.to_string());
        tracing::info!(workflow = %name, previous = ?previous, "Active workflow switched");
        true
    }

    /// Replaces `name` with a fresh instance.
    ///
    /// The old instance is deactivated and cleaned up first. If it was active
    /// the new one is reactivated; if the rebuild fails the workflow is left
    /// in `Error` and nothing is active.
    pub async fn hot_reload_workflow(&self, name: &str) -> bool {
        if !self.registry.contains(name) {
            tracing::warn!(workflow = %name, "Cannot reload unknown workflow");
            return false;
        }
        let _lifecycle = self.lifecycle.lock().await;

        let (previous, was_active) = {
            let mut state = self.write_state();
            let was_active = state.active.as_deref() == Some(name);
            if was_active {
                state.active = None;
            }
            let previous = state.slots.get_mut(name).and_then(|slot| slot.instance.take());
            (previous, was_active)
        };
        tracing::info!(workflow = %name, was_active, "Hot reloading workflow");

        if let Some(previous) = previous {
            previous.cleanup().await;
        }

        let state = self.construct(name).await;
        if !state.is_usable() {
            tracing::error!(workflow = %name, "Hot reload failed");
            return false;
        }
        if was_active {
            self.write_state().active = Some(name.to_string());
        }
        self.ensure_monitor().await;
        tracing::info!(workflow = %name, state = %state, "Hot reload complete");
        true
    }

    /// Creates `name` if needed and makes it the active workflow.
    pub async fn create_workflow_on_demand(&self, name: &str) -> bool {
        let _lifecycle = self.lifecycle.lock().await;

        let usable = self
            .read_state()
            .slots
            .get(name)
            .map_or(false, |slot| slot.state.is_usable());
        if !usable {
            tracing::info!(workflow = %name, "Creating workflow on demand");
            if !self.construct(name).await.is_usable() {
                return false;
            }
            self.ensure_monitor().await;
        }

        self.write_state().active = Some(name.to_string());
        true
    }

    pub fn active_workflow(&self) -> Option<String> {
        self.read_state().active.clone()
    }

    fn active_instance(&self) -> Option<Arc<dyn Workflow>> {
        let state = self.read_state();
        let name = state.active.as_ref()?;
        state.slots.get(name).and_then(|slot| slot.instance.clone())
    }

    /// The active workflow, bootstrapping the default one if none is active.
    async fn active_or_bootstrap(&self) -> Option<Arc<dyn Workflow>> {
        if let Some(instance) = self.active_instance() {
            return Some(instance);
        }
        let default = self.settings.default_workflow.clone();
        if self.create_workflow_on_demand(&default).await {
            self.active_instance()
        } else {
            None
        }
    }

    /// Failure returned when no workflow can take a request.
    fn unavailable(&self) -> IntentResult {
        let code = if self.registry.contains(&self.settings.default_workflow) {
            ErrorCode::WorkflowUnavailable
        } else {
            ErrorCode::WorkflowNotFound
        };
        IntentResult::failure(UNAVAILABLE_TEXT, code)
    }

    pub async fn process_text_input(
        &self,
        text: &str,
        session_id: SessionId,
        wants_audio: bool,
        client: ClientContext,
    ) -> IntentResult {
        match self.active_or_bootstrap().await {
            Some(workflow) => {
                workflow
                    .process_text(text, RequestContext::text(session_id, wants_audio, client))
                    .await
            }
            None => {
                tracing::warn!(session_id = %session_id, "Text input dropped; no workflow available");
                self.unavailable()
            }
        }
    }

    pub async fn process_audio_stream(
        &self,
        audio: BoxStream<'static, AudioChunk>,
        session_id: SessionId,
        skip_wake_word: bool,
        wants_audio: bool,
        client: ClientContext,
    ) -> BoxStream<'static, IntentResult> {
        match self.active_or_bootstrap().await {
            Some(workflow) => {
                let request = RequestContext::audio(session_id, skip_wake_word, wants_audio, client);
                workflow.process_audio_stream(audio, request)
            }
            None => {
                tracing::warn!(session_id = %session_id, "Audio stream dropped; no workflow available");
                let failure = self.unavailable();
                stream::once(async move { failure }).boxed()
            }
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        let state = self.read_state();
        let mut overall = LoadProgress::default();
        let workflows = state
            .slots
            .iter()
            .map(|(name, slot)| {
                let (progress, components) = match &slot.instance {
                    Some(instance) => (instance.load_progress(), instance.component_names()),
                    None => (LoadProgress::default(), Vec::new()),
                };
                overall = overall + progress;
                let info = WorkflowInfo {
                    state: slot.state,
                    ready: slot.state == WorkflowState::Ready,
                    progress,
                    percent: progress.percent(),
                    components,
                    error: slot.error.clone(),
                };
                (name.clone(), info)
            })
            .collect();

        WorkflowStatus {
            active: state.active.clone(),
            workflows,
            available: self.registry.names(),
            overall_progress: overall.percent(),
        }
    }

    /// True while the progress monitor task is running.
    pub async fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .await
            .as_ref()
            .map_or(false, |m| !m.is_finished())
    }

    /// Stops the monitor, deactivates and cleans up every workflow.
    pub async fn shutdown(&self) {
        if let Some(monitor) = self.monitor.lock().await.take() {
            monitor.stop().await;
        }

        let instances: Vec<(String, Arc<dyn Workflow>)> = {
            let mut state = self.write_state();
            state.active = None;
            std::mem::take(&mut state.slots)
                .into_iter()
                .filter_map(|(name, slot)| slot.instance.map(|instance| (name, instance)))
                .collect()
        };
        for (name, instance) in instances {
            instance.cleanup().await;
            tracing::info!(workflow = %name, "Workflow stopped");
        }
    }
}
