//! Fire-and-forget action execution.

mod tracker;

pub use tracker::{ActionTracker, StartedAction};
