//! Background polling of warm-up progress.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::manager::ManagerState;
use crate::domain::foundation::StateMachine;
use crate::domain::workflow::{LoadProgress, WorkflowState};

/// Polls warming workflows until every one is ready or the monitor is stopped.
pub struct ProgressMonitor {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressMonitor {
    pub(super) fn spawn(state: Arc<RwLock<ManagerState>>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            tracing::debug!(interval_ms = interval.as_millis() as u64, "Progress monitor started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("Progress monitor stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let percent = poll_once(&state);
                        if percent >= 100.0 {
                            tracing::info!("All workflows ready; progress monitor finished");
                            return;
                        }
                    }
                }
            }
        });
        Self { cancel, handle }
    }

    /// Cancels the poll loop and waits for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            tracing::warn!(error = %err, "Progress monitor task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Advances ready workflows and returns overall progress in percent.
pub(super) fn poll_once(state: &RwLock<ManagerState>) -> f64 {
    let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
    let mut overall = LoadProgress::default();

    for (name, slot) in state.slots.iter_mut() {
        let Some(instance) = &slot.instance else {
            continue;
        };
        let progress = instance.load_progress();
        overall = overall + progress;

        if slot.state == WorkflowState::WarmingUp && instance.is_ready() {
            match slot.state.transition_to(WorkflowState::Ready) {
                Ok(next) => {
                    slot.state = next;
                    tracing::info!(workflow = %name, "Workflow ready");
                }
                Err(err) => tracing::warn!(workflow = %name, error = %err, "Ready transition rejected"),
            }
        } else if slot.state == WorkflowState::WarmingUp {
            tracing::debug!(
                workflow = %name,
                loaded = progress.loaded,
                total = progress.total,
                "Workflow warming up"
            );
        }
    }

    overall.percent()
}

#[cfg(test)]
mod tests {
    use super::super::manager::WorkflowSlot;
    use super::*;
    use crate::application::workflow::{Component, Workflow, WorkflowError};
    use crate::domain::intent::IntentResult;
    use crate::domain::pipeline::RequestContext;
    use crate::ports::AudioChunk;
    use async_trait::async_trait;
    use futures::stream::{BoxStream, StreamExt};
    use std::sync::Mutex;

    struct LoadingWorkflow {
        progress: Arc<Mutex<LoadProgress>>,
    }

    #[async_trait]
    impl Workflow for LoadingWorkflow {
        fn name(&self) -> &str {
            "loading"
        }

        fn add_component(&mut self, _name: &str, _component: Component) {}

        fn component_names(&self) -> Vec<String> {
            Vec::new()
        }

        async fn initialize(&mut self) -> Result<(), WorkflowError> {
            Ok(())
        }

        fn load_progress(&self) -> LoadProgress {
            *self.progress.lock().unwrap()
        }

        async fn process_text(&self, text: &str, _request: RequestContext) -> IntentResult {
            IntentResult::success(text)
        }

        fn process_audio_stream(
            self: Arc<Self>,
            _audio: BoxStream<'static, AudioChunk>,
            _request: RequestContext,
        ) -> BoxStream<'static, IntentResult> {
            futures::stream::empty().boxed()
        }

        async fn cleanup(&self) {}
    }

    fn warming(progress: LoadProgress) -> (Arc<RwLock<ManagerState>>, Arc<Mutex<LoadProgress>>) {
        let progress = Arc::new(Mutex::new(progress));
        let mut state = ManagerState::default();
        state.slots.insert(
            "loading".to_string(),
            WorkflowSlot {
                state: WorkflowState::WarmingUp,
                instance: Some(Arc::new(LoadingWorkflow {
                    progress: Arc::clone(&progress),
                })),
                error: None,
            },
        );
        (Arc::new(RwLock::new(state)), progress)
    }

    fn slot_state(state: &RwLock<ManagerState>) -> WorkflowState {
        state.read().unwrap().slots["loading"].state
    }

    #[tokio::test(start_paused = true)]
    async fn fully_loaded_workflow_finishes_after_first_tick() {
        let (state, _progress) = warming(LoadProgress::new(2, 2));

        let monitor = ProgressMonitor::spawn(Arc::clone(&state), Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(monitor.is_finished());
        assert_eq!(slot_state(&state), WorkflowState::Ready);
        assert_eq!(poll_once(&state), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_polling_until_providers_load() {
        let (state, progress) = warming(LoadProgress::new(1, 2));

        let monitor = ProgressMonitor::spawn(Arc::clone(&state), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(!monitor.is_finished());
        assert_eq!(slot_state(&state), WorkflowState::WarmingUp);

        *progress.lock().unwrap() = LoadProgress::new(2, 2);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(monitor.is_finished());
        assert_eq!(slot_state(&state), WorkflowState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_loop_to_exit() {
        let (state, _progress) = warming(LoadProgress::new(0, 3));

        let monitor = ProgressMonitor::spawn(Arc::clone(&state), Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!monitor.is_finished());

        monitor.stop().await;

        // The loop's clone of the state is dropped once its task has ended.
        assert_eq!(Arc::strong_count(&state), 1);
        assert_eq!(slot_state(&state), WorkflowState::WarmingUp);
    }

    #[test]
    fn poll_reports_overall_percent() {
        let (state, _progress) = warming(LoadProgress::new(1, 4));
        assert_eq!(poll_once(&state), 25.0);
        assert_eq!(slot_state(&state), WorkflowState::WarmingUp);
    }
}
