//! State machine trait for lifecycle enums.
//!
//! Shared by the conversation state and the workflow lifecycle state so both
//! validate transitions the same way.

use super::ValidationError;

/// Trait for enums whose values form a state machine.
///
/// Implementors list the legal edges; `transition_to` then rejects anything
/// else with a `ValidationError`.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for WorkflowState {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!(
///             (self, target),
///             (Initializing, WarmingUp) | (WarmingUp, Ready)
///         )
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> { ... }
/// }
///
/// let next = state.transition_to(WorkflowState::Ready)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
