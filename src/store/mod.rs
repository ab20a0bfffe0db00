//! Game state persistence
//!
//! This module defines the store boundary that owns all mutable matchmaking
//! state, the in-memory backend, and the retry/deadline decorator applied in
//! front of any backend.

pub mod game_store;
pub mod memory;
pub mod retry;

// Re-export commonly used types
pub use game_store::{
    GameStore, JoinedGame, MapResolution, PickSnapshot, RemovalOutcome, StatusChange, StoreStats,
};
pub use memory::MemoryGameStore;
pub use retry::{RetryPolicy, RetryingStore};
