//! Common types used throughout the matchmaking lifecycle service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for games
pub type GameId = Uuid;

/// Identifier for a map in the external catalog
pub type MapId = String;

/// Base rating assigned to players with no match history
pub const DEFAULT_RATING: i32 = 1000;

/// Game mode, with a fixed player capacity per mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Duel,
    Wingman,
    Competitive,
}

impl GameMode {
    /// Maximum number of players for this mode, resolved once at game creation
    pub fn capacity(&self) -> u32 {
        match self {
            GameMode::Duel => 2,
            GameMode::Wingman => 4,
            GameMode::Competitive => 10,
        }
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameMode::Duel => write!(f, "duel"),
            GameMode::Wingman => write!(f, "wingman"),
            GameMode::Competitive => write!(f, "competitive"),
        }
    }
}

/// How the match map is chosen, fixed at game creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapSelectionMode {
    AllPick,
    HostPick,
    RandomMap,
}

impl std::fmt::Display for MapSelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapSelectionMode::AllPick => write!(f, "all-pick"),
            MapSelectionMode::HostPick => write!(f, "host-pick"),
            MapSelectionMode::RandomMap => write!(f, "random-map"),
        }
    }
}

/// Lifecycle status of a game; the single source of truth for what
/// operations are legal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Queue,
    Lobby,
    InProgress,
    Completed,
    Cancelled,
}

impl GameStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Cancelled)
    }

    /// Whether a legal edge exists from `self` to `next`
    pub fn can_transition_to(&self, next: GameStatus) -> bool {
        matches!(
            (self, next),
            (GameStatus::Queue, GameStatus::Lobby)
                | (GameStatus::Queue, GameStatus::Cancelled)
                | (GameStatus::Lobby, GameStatus::InProgress)
                | (GameStatus::Lobby, GameStatus::Cancelled)
                | (GameStatus::InProgress, GameStatus::Completed)
        )
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameStatus::Queue => write!(f, "queue"),
            GameStatus::Lobby => write!(f, "lobby"),
            GameStatus::InProgress => write!(f, "in_progress"),
            GameStatus::Completed => write!(f, "completed"),
            GameStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The unit of matchmaking state: a queue, its lobby, and the eventual match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    /// Monotonically increasing, assigned once; correlates with external
    /// per-match statistics
    pub match_number: u64,
    pub host_id: PlayerId,
    pub mode: GameMode,
    pub selection_mode: MapSelectionMode,
    pub server: Option<String>,
    pub password: Option<String>,
    pub ranked: bool,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub max_players: u32,
    /// Denormalized count; always equals the number of attached player records
    pub current_players: u32,
    pub status: GameStatus,
    pub selected_map: Option<MapId>,
    pub map_selection_complete: bool,
    /// Epoch milliseconds marking when clients should begin the map reveal
    /// animation; `None` until selection resolves
    pub map_anim_select_start_time: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Game {
    /// Build a fresh queue-status game for the given host
    ///
    /// The match number is a placeholder until the store assigns the real
    /// one at insert time; capacity comes from the mode.
    pub fn new(host_id: PlayerId, request: &CreateQueueRequest) -> Self {
        let now = crate::utils::current_timestamp();
        Self {
            id: crate::utils::generate_game_id(),
            match_number: 0,
            host_id,
            mode: request.mode,
            selection_mode: request.selection_mode,
            server: request.server.clone(),
            password: request.password.clone(),
            ranked: request.ranked,
            scheduled_start: request.scheduled_start,
            max_players: request.mode.capacity(),
            current_players: 1,
            status: GameStatus::Queue,
            selected_map: None,
            map_selection_complete: false,
            map_anim_select_start_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }
}

/// Parameters for opening a new queue
///
/// The maximum player count is not a parameter: it is resolved from the
/// mode's fixed capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    pub host_id: PlayerId,
    pub mode: GameMode,
    pub selection_mode: MapSelectionMode,
    pub server: Option<String>,
    pub password: Option<String>,
    pub ranked: bool,
    pub scheduled_start: Option<DateTime<Utc>>,
}

/// Association between a player identity and a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamePlayer {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub joined_at: DateTime<Utc>,
    pub team: Option<u32>,
    pub map_selection: Option<MapId>,
    /// Gates whether a completed game still blocks this player from queuing
    pub accepted_result: bool,
}

impl GamePlayer {
    pub fn new(game_id: GameId, player_id: PlayerId) -> Self {
        Self {
            game_id,
            player_id,
            joined_at: crate::utils::current_timestamp(),
            team: None,
            map_selection: None,
            accepted_result: false,
        }
    }
}

/// Created only when a lobby forms from a full queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub game_id: GameId,
    pub number: u32,
    pub name: String,
    /// Snapshot of the members' average rating, recomputed on membership or
    /// rating changes
    pub average_rating: i32,
}

/// Kinds of audit events recorded against a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventKind {
    Created,
    Joined,
    Left,
    Disband,
    Timeout,
    LobbyFormed,
    MapSelected,
    ServerAssigned,
    MatchCompleted,
    ResultAccepted,
}

impl std::fmt::Display for HistoryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryEventKind::Created => write!(f, "created"),
            HistoryEventKind::Joined => write!(f, "joined"),
            HistoryEventKind::Left => write!(f, "left"),
            HistoryEventKind::Disband => write!(f, "disband"),
            HistoryEventKind::Timeout => write!(f, "timeout"),
            HistoryEventKind::LobbyFormed => write!(f, "lobby_formed"),
            HistoryEventKind::MapSelected => write!(f, "map_selected"),
            HistoryEventKind::ServerAssigned => write!(f, "server_assigned"),
            HistoryEventKind::MatchCompleted => write!(f, "match_completed"),
            HistoryEventKind::ResultAccepted => write!(f, "result_accepted"),
        }
    }
}

/// Immutable append-only audit record; observational only, never drives logic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub kind: HistoryEventKind,
    pub event_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEvent {
    pub fn new(
        game_id: GameId,
        player_id: PlayerId,
        kind: HistoryEventKind,
        event_data: serde_json::Value,
    ) -> Self {
        Self {
            game_id,
            player_id,
            kind,
            event_data,
            timestamp: crate::utils::current_timestamp(),
        }
    }
}

/// Consistent read of a game together with its players and teams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game: Game,
    pub players: Vec<GamePlayer>,
    pub teams: Vec<Team>,
}

/// Per-player rating movement produced by a completed match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub player_id: PlayerId,
    pub old_rating: i32,
    pub new_rating: i32,
    pub delta: i32,
}

/// Outcome of applying the rating engine to one completed match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRatingOutcome {
    pub winning_team_average: i32,
    pub losing_team_average: i32,
    pub changes: Vec<RatingChange>,
}

/// Inbound AMQP Message Types
/// Authoritative final scores reported by the match-stats collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResultReport {
    pub game_id: GameId,
    pub team1_score: u32,
    pub team2_score: u32,
    pub timestamp: DateTime<Utc>,
}

/// Server connection info reported by the allocation collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerAssignment {
    pub game_id: GameId,
    pub server: String,
    pub timestamp: DateTime<Utc>,
}

/// Outbound AMQP Message Types
/// Event emitted when a new queue opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueOpened {
    pub game_id: GameId,
    pub match_number: u64,
    pub host_id: PlayerId,
    pub mode: GameMode,
    pub selection_mode: MapSelectionMode,
    pub max_players: u32,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a player joins a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoined {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub current_players: u32,
    pub max_players: u32,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a player leaves a queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeft {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub current_players: u32,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a full queue converts into a lobby
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyFormed {
    pub game_id: GameId,
    pub match_number: u64,
    pub teams: Vec<Team>,
    pub players: Vec<GamePlayer>,
    pub selected_map: Option<MapId>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when map selection resolves
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSelected {
    pub game_id: GameId,
    pub map_id: MapId,
    /// Epoch milliseconds for the client-side reveal animation start
    pub anim_select_start_time: i64,
    /// How long clients should run the spinning reveal before trusting the
    /// selected map
    pub reveal_duration_ms: i64,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a match completes and ratings settle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCompleted {
    pub game_id: GameId,
    pub match_number: u64,
    pub team1_score: u32,
    pub team2_score: u32,
    pub rating_changes: Vec<RatingChange>,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a game is cancelled (disband or sweep timeout)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameCancelled {
    pub game_id: GameId,
    pub reason: HistoryEventKind,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all AMQP messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    MatchResultReport(MatchResultReport),
    ServerAssignment(ServerAssignment),
    QueueOpened(QueueOpened),
    PlayerJoined(PlayerJoined),
    PlayerLeft(PlayerLeft),
    LobbyFormed(LobbyFormed),
    MapSelected(MapSelected),
    GameCompleted(GameCompleted),
    GameCancelled(GameCancelled),
}
