//! Component registries - named components available for injection.

mod in_memory;

pub use in_memory::InMemoryComponentRegistry;
