//! AMQP message definitions and serialization

use crate::error::{GameError, Result};
use crate::types::*;
use serde_json;

/// Inbound queue names
pub const MATCH_RESULT_QUEUE: &str = "pug.match_result_reports";
pub const SERVER_ASSIGNMENT_QUEUE: &str = "pug.server_assignments";

/// Outbound exchanges
pub const GAME_EVENTS_EXCHANGE: &str = "pug.game_events";
pub const PLAYER_EVENTS_EXCHANGE: &str = "pug.player_events";

/// Routing keys for outbound events
pub const QUEUE_OPENED_ROUTING_KEY: &str = "queue.opened";
pub const PLAYER_JOINED_ROUTING_KEY: &str = "player.joined";
pub const PLAYER_LEFT_ROUTING_KEY: &str = "player.left";
pub const LOBBY_FORMED_ROUTING_KEY: &str = "lobby.formed";
pub const MAP_SELECTED_ROUTING_KEY: &str = "map.selected";
pub const GAME_COMPLETED_ROUTING_KEY: &str = "game.completed";
pub const GAME_CANCELLED_ROUTING_KEY: &str = "game.cancelled";

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: crate::utils::generate_correlation_id(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            GameError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            GameError::InvalidMessage {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Message serialization and validation utilities
pub struct MessageUtils;

impl MessageUtils {
    /// Deserialize a match result report from bytes
    pub fn deserialize_match_result(bytes: &[u8]) -> Result<MatchResultReport> {
        let report: MatchResultReport =
            serde_json::from_slice(bytes).map_err(|e| GameError::InvalidMessage {
                reason: format!("Failed to deserialize match result report: {}", e),
            })?;
        Ok(report)
    }

    /// Deserialize a server assignment from bytes
    pub fn deserialize_server_assignment(bytes: &[u8]) -> Result<ServerAssignment> {
        let assignment: ServerAssignment =
            serde_json::from_slice(bytes).map_err(|e| GameError::InvalidMessage {
                reason: format!("Failed to deserialize server assignment: {}", e),
            })?;

        Self::validate_server_assignment(&assignment)?;
        Ok(assignment)
    }

    /// Validate a server assignment
    pub fn validate_server_assignment(assignment: &ServerAssignment) -> Result<()> {
        if assignment.server.trim().is_empty() {
            return Err(GameError::InvalidMessage {
                reason: "Server address cannot be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Serialize any AMQP message to bytes
    pub fn serialize_message<T: serde::Serialize>(message: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(message).map_err(|e| {
            GameError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Get routing key for a message type
    pub fn get_routing_key(message: &WireMessage) -> &'static str {
        match message {
            WireMessage::MatchResultReport(_) => "match.result",
            WireMessage::ServerAssignment(_) => "server.assigned",
            WireMessage::QueueOpened(_) => QUEUE_OPENED_ROUTING_KEY,
            WireMessage::PlayerJoined(_) => PLAYER_JOINED_ROUTING_KEY,
            WireMessage::PlayerLeft(_) => PLAYER_LEFT_ROUTING_KEY,
            WireMessage::LobbyFormed(_) => LOBBY_FORMED_ROUTING_KEY,
            WireMessage::MapSelected(_) => MAP_SELECTED_ROUTING_KEY,
            WireMessage::GameCompleted(_) => GAME_COMPLETED_ROUTING_KEY,
            WireMessage::GameCancelled(_) => GAME_CANCELLED_ROUTING_KEY,
        }
    }
}
