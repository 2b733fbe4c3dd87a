//! Pattern Source Port - supplier of per-handler routing tables.
//!
//! An external asset loader parses donation files into [`PatternTable`]s.
//! The dispatcher treats each table as an immutable snapshot and re-reads it
//! when the source's generation changes after an external reload.

use std::sync::Arc;

use crate::domain::intent::PatternTable;

pub trait PatternSource: Send + Sync {
    /// The current table for a handler, if one is loaded.
    fn pattern_table(&self, handler: &str) -> Option<Arc<PatternTable>>;

    /// Monotonic counter bumped on every reload.
    fn generation(&self) -> u64;
}
