//! Workflow module - lifecycle state of a workflow instance.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle state of one named workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Constructed, components being injected and initialized.
    #[default]
    Initializing,

    /// Initialized, providers still loading.
    WarmingUp,

    /// All providers loaded.
    Ready,

    /// Initialization or reload failed.
    Error,
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Initializing => "initializing",
            WorkflowState::WarmingUp => "warming_up",
            WorkflowState::Ready => "ready",
            WorkflowState::Error => "error",
        }
    }

    /// True once initialization finished, whether or not warm-up is done.
    pub fn is_usable(&self) -> bool {
        matches!(self, WorkflowState::WarmingUp | WorkflowState::Ready)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for WorkflowState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use WorkflowState::*;
        matches!(
            (self, target),
            (Initializing, WarmingUp)
                | (WarmingUp, Ready)
                | (Initializing, Error)
                | (WarmingUp, Error)
                | (Ready, Error)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use WorkflowState::*;
        match self {
            Initializing => vec![WarmingUp, Error],
            WarmingUp => vec![Ready, Error],
            Ready => vec![Error],
            Error => vec![],
        }
    }
}

/// Loaded and total provider counts reported during warm-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub loaded: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn new(loaded: usize, total: usize) -> Self {
        Self { loaded, total }
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }

    /// Percentage loaded; nothing to load counts as 100.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.loaded.min(self.total) as f64 / self.total as f64) * 100.0
        }
    }
}

impl std::ops::Add for LoadProgress {
    type Output = LoadProgress;

    fn add(self, other: LoadProgress) -> LoadProgress {
        LoadProgress::new(self.loaded + other.loaded, self.total + other.total)
    }
}

impl std::iter::Sum for LoadProgress {
    fn sum<I: Iterator<Item = LoadProgress>>(iter: I) -> LoadProgress {
        iter.fold(LoadProgress::default(), |acc, p| acc + p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod state_machine {
        use super::*;

        #[test]
        fn happy_path_is_initializing_warming_ready() {
            let s = WorkflowState::Initializing;
            let s = s.transition_to(WorkflowState::WarmingUp).unwrap();
            let s = s.transition_to(WorkflowState::Ready).unwrap();
            assert_eq!(s, WorkflowState::Ready);
        }

        #[test]
        fn ready_never_reverts() {
            assert!(WorkflowState::Ready.transition_to(WorkflowState::Initializing).is_err());
            assert!(WorkflowState::Ready.transition_to(WorkflowState::WarmingUp).is_err());
        }

        #[test]
        fn error_reachable_from_every_other_state() {
            for s in [WorkflowState::Initializing, WorkflowState::WarmingUp, WorkflowState::Ready] {
                assert!(s.can_transition_to(&WorkflowState::Error));
            }
        }

        #[test]
        fn error_is_terminal() {
            assert!(WorkflowState::Error.is_terminal());
        }

        #[test]
        fn skipping_warm_up_is_invalid() {
            assert!(!WorkflowState::Initializing.can_transition_to(&WorkflowState::Ready));
        }
    }

    mod progress {
        use super::*;

        #[test]
        fn empty_progress_is_complete() {
            let p = LoadProgress::default();
            assert!(p.is_complete());
            assert_eq!(p.percent(), 100.0);
        }

        #[test]
        fn percent_is_ratio() {
            assert_eq!(LoadProgress::new(1, 4).percent(), 25.0);
        }

        #[test]
        fn sums_across_workflows() {
            let total: LoadProgress = vec![LoadProgress::new(1, 2), LoadProgress::new(3, 3)]
                .into_iter()
                .sum();
            assert_eq!(total, LoadProgress::new(4, 5));
        }
    }
}
