//! Utility functions for the matchmaking lifecycle service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique game ID
pub fn generate_game_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new correlation ID for wire messages
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as epoch milliseconds, the unit clients use for the map
/// reveal animation stamp
pub fn epoch_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Pick an index uniformly from `0..len`
///
/// Draws entropy from a fresh v4 UUID so the crate carries no dedicated RNG
/// dependency. `len` must be non-zero.
pub fn uniform_index(len: usize) -> usize {
    debug_assert!(len > 0);
    let bytes = Uuid::new_v4().into_bytes();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&bytes[..8]);
    (u64::from_le_bytes(seed) % len as u64) as usize
}
