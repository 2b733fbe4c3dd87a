//! Intent module - recognized intents, results, and routing tables.

mod model;
mod pattern_table;
mod result;

pub use model::{Intent, FALLBACK_INTENT_NAME, GENERAL_DOMAIN, RECOGNITION_FAILED_ENTITY};
pub use pattern_table::{FallbackCondition, MatchKind, MethodSpec, PatternTable};
pub use result::IntentResult;
