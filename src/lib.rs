//! Pug Room - Matchmaking lifecycle service for competitive pickup games
//!
//! This crate provides AMQP-based game lifecycle management with queueing,
//! map selection, Elo ratings, and result acceptance for pickup game rooms.

pub mod amqp;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod maps;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod store;
pub mod sweep;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{GameError, Result};
pub use types::*;

// Re-export key components
pub use amqp::publisher::EventPublisher;
pub use lifecycle::LifecycleController;
pub use store::{GameStore, MemoryGameStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
