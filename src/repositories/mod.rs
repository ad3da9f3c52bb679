pub mod watch_registry;

// Re-export for convenient access
pub use watch_registry::{RegistryResult, RegistrySnapshot, WatchRegistry};
