//! ELO rating engine
//!
//! This module provides the pure rating calculations applied when a match
//! completes: expected scores, clamped rating updates, and team averages.

pub mod elo;
pub mod engine;

// Re-export commonly used types
pub use elo::{EloConfig, EloRatingEngine};
pub use engine::RatingEngine;
