//! Donation loaders - sources of per-handler pattern tables.

mod in_memory;

pub use in_memory::InMemoryPatternSource;
