//! Map selection for forming and formed lobbies
//!
//! The catalog says which maps each mode may use; the coordinator runs the
//! selection protocol a game was created with.

pub mod catalog;
pub mod coordinator;

/// Sentinel pick meaning "choose for me"; never a real map identifier
pub const RANDOM_PICK: &str = "random";

// Re-export commonly used types
pub use catalog::{MapCatalog, MapPool, StaticMapCatalog};
pub use coordinator::{MapSelectionCoordinator, SelectionProgress};
