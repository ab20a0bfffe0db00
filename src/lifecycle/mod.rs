//! Game lifecycle management
//!
//! This module owns the state machine that carries a game from an open
//! queue through lobby formation and map selection to a completed match,
//! and the team-splitting rules applied at promotion time.

pub mod controller;
pub mod teams;

// Re-export commonly used types
pub use controller::{CompletionOutcome, JoinOutcome, LeaveOutcome, LifecycleController};
pub use teams::{assign_teams, build_teams, TEAM_COUNT};
