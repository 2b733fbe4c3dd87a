//! Action notifiers.

mod logging;

pub use logging::LoggingNotifier;
