//! Error types for the matchmaking lifecycle service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific lifecycle scenarios
///
/// Each kind stays distinguishable to the caller so UI layers can report
/// "queue is full" vs "wrong password" vs "already in a game" precisely.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Player is already in an active game: {player_id}")]
    AlreadyInGame { player_id: String },

    #[error("Queue is full: {game_id}")]
    QueueFull { game_id: String },

    #[error("Incorrect password for game: {game_id}")]
    BadPassword { game_id: String },

    /// Also raised when an operation requires a status the game is not in;
    /// `to` then names the required status
    #[error("Illegal status transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Map selection already complete for game: {game_id}")]
    SelectionAlreadyComplete { game_id: String },

    #[error("Player has no active queue or lobby: {player_id}")]
    NotInQueue { player_id: String },

    #[error("Only the host may perform this action: {player_id}")]
    NotHost { player_id: String },

    #[error("Storage unavailable after {attempts} attempts: {message}")]
    StorageUnavailable { attempts: u32, message: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
