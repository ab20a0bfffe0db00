//! Rating engine trait definition
//!
//! The engine is a pure function set: no storage, no I/O. The lifecycle
//! controller feeds it team rosters on match completion and persists the
//! returned deltas.

use crate::types::{MatchRatingOutcome, PlayerId};

/// Computes rating movement for completed matches
pub trait RatingEngine: Send + Sync {
    /// Probability that a player rated `a` beats a player rated `b`
    fn expected_score(&self, a: i32, b: i32) -> f64;

    /// New rating after one decisive result
    ///
    /// `actual` is 1.0 for a win and 0.0 for a loss. Winners never land
    /// below `current + 1`, even when the raw formula rounds to a smaller
    /// or negative delta; losses use the unclamped formula.
    fn new_rating(&self, current: i32, expected: f64, actual: f64) -> i32;

    /// Rounded arithmetic mean of the given ratings; empty input falls back
    /// to the base rating
    fn team_average(&self, ratings: &[i32]) -> i32;

    /// Apply the engine to one decisive match
    ///
    /// Each player is scored against the opposing team's average. Callers
    /// must not invoke this for tied matches; ties apply no rating change
    /// to anyone.
    fn process_match(
        &self,
        winning_team: &[(PlayerId, i32)],
        losing_team: &[(PlayerId, i32)],
    ) -> MatchRatingOutcome;
}
