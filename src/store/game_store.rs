//! Game store trait definition
//!
//! The store owns all mutable matchmaking state: games, player records,
//! teams, ratings, and the history log. Every mutation primitive is
//! conditional where races matter (queue fill, cancellation, selection
//! resolution), so concurrent callers converge instead of double-firing.

use crate::error::Result;
use crate::types::{
    Game, GameId, GamePlayer, GameSnapshot, GameStatus, HistoryEvent, MapId, PlayerId,
    RatingChange, Team,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of a conditional status update
#[derive(Debug, Clone)]
pub enum StatusChange {
    /// The transition was applied; carries the updated game
    Applied(Game),
    /// The game was already past the requested transition (terminal, or the
    /// target status was reached by a concurrent caller); nothing was changed
    Skipped(Game),
}

impl StatusChange {
    pub fn game(&self) -> &Game {
        match self {
            StatusChange::Applied(game) => game,
            StatusChange::Skipped(game) => game,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, StatusChange::Applied(_))
    }
}

/// Result of a conditional player add
#[derive(Debug, Clone)]
pub struct JoinedGame {
    pub game: Game,
    /// True for exactly one caller: the join that brought the game to
    /// capacity. That caller is responsible for forming the lobby.
    pub filled: bool,
}

/// Result of a player removal
#[derive(Debug, Clone)]
pub enum RemovalOutcome {
    Removed {
        game: Game,
        removed: GamePlayer,
        remaining: Vec<GamePlayer>,
    },
    /// The game was already terminal, or the record was already gone
    NoOp(Game),
}

/// Consistent view of map-selection progress, taken in the same critical
/// section as the pick write
#[derive(Debug, Clone)]
pub struct PickSnapshot {
    pub game: Game,
    pub players: Vec<GamePlayer>,
}

impl PickSnapshot {
    /// Whether every player has a recorded selection
    pub fn all_selected(&self) -> bool {
        !self.players.is_empty() && self.players.iter().all(|p| p.map_selection.is_some())
    }
}

/// A resolved map outcome to stamp onto a game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResolution {
    pub map_id: MapId,
    /// Epoch milliseconds when clients should start the reveal animation
    pub anim_select_start_time: i64,
    /// Player picks to persist alongside the resolution: sentinel picks
    /// rewritten to concrete maps, or the host's pick in host-pick mode
    pub pick_updates: Vec<(PlayerId, MapId)>,
}

/// Aggregate counters for observability endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub queued_games: usize,
    pub lobby_games: usize,
    pub in_progress_games: usize,
    pub completed_games: usize,
    pub cancelled_games: usize,
    pub players_in_games: usize,
    pub rated_players: usize,
    pub history_events: usize,
}

impl StoreStats {
    pub fn total_games(&self) -> usize {
        self.queued_games
            + self.lobby_games
            + self.in_progress_games
            + self.completed_games
            + self.cancelled_games
    }
}

/// Persistence boundary for the matchmaking lifecycle
///
/// Implementations must make each method atomic with respect to the others:
/// callers rely on the conditional methods to resolve races (two joins
/// filling the last slot, a leave racing the cleanup sweep) without
/// double-applying.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Insert a new game and its host player record, assigning the next
    /// match number
    ///
    /// Enforces the one-active-game-per-player constraint for the host:
    /// fails with `AlreadyInGame` if the host already has a blocking game.
    async fn create_game(&self, game: Game, host: GamePlayer) -> Result<Game>;

    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>>;

    /// Game plus players plus teams, read under one lock acquisition
    async fn get_snapshot(&self, game_id: GameId) -> Result<Option<GameSnapshot>>;

    /// The game currently blocking this player from queuing: any game the
    /// player belongs to that is non-terminal, or completed but not yet
    /// accepted by them. Derived at call time, never cached.
    async fn find_blocking_game(&self, player_id: &str) -> Result<Option<Game>>;

    /// The player's current `queue` or `lobby` game, if any; the target of
    /// leave/disband
    async fn find_open_game(&self, player_id: &str) -> Result<Option<Game>>;

    async fn list_by_status(&self, status: GameStatus) -> Result<Vec<Game>>;

    /// Conditionally add a player: requires `queue` status and a free slot,
    /// and that the player has no blocking game anywhere
    ///
    /// Exactly one concurrent caller observes `filled == true` when its add
    /// reaches capacity. Fails `QueueFull` when the game is full or already
    /// past the queue phase, `NotFound` when terminal or missing,
    /// `AlreadyInGame` on the player-uniqueness constraint.
    async fn add_player(&self, game_id: GameId, player: GamePlayer) -> Result<JoinedGame>;

    /// Promote a full queue to a lobby, installing teams and assignments,
    /// conditional on the player count still matching `expected_players`
    ///
    /// Returns `Skipped` when the game went terminal; fails
    /// `InvalidStateTransition` when the count check fails (a leave slipped
    /// in after the fill) so the caller can abandon the promotion.
    async fn begin_lobby(
        &self,
        game_id: GameId,
        expected_players: u32,
        teams: Vec<Team>,
        assignments: Vec<(PlayerId, u32)>,
        resolved_map: Option<MapResolution>,
    ) -> Result<StatusChange>;

    /// Remove a player record and decrement the count; no-op when the game
    /// is already terminal or the record is already gone
    async fn remove_player(&self, game_id: GameId, player_id: &str) -> Result<RemovalOutcome>;

    /// Compare-and-set on status: applies `from -> to` only when the game is
    /// still in `from`
    ///
    /// `Skipped` when the game is already in `to` or terminal; fails
    /// `InvalidStateTransition` for any other current status.
    async fn transition_status(
        &self,
        game_id: GameId,
        from: GameStatus,
        to: GameStatus,
    ) -> Result<StatusChange>;

    /// Cancel from either `queue` or `lobby`; `Skipped` when already
    /// terminal; fails `InvalidStateTransition` from `in_progress`
    async fn cancel_game(&self, game_id: GameId) -> Result<StatusChange>;

    /// Record the allocated server and move `lobby -> in_progress`;
    /// idempotent for repeated assignment reports
    async fn record_server_assignment(&self, game_id: GameId, server: &str)
        -> Result<StatusChange>;

    /// Write one player's map pick (last writer wins) and return the full
    /// pick state from the same critical section
    ///
    /// Fails `SelectionAlreadyComplete` once resolution has been committed,
    /// `NotFound` when the player has no record in the game.
    async fn record_map_pick(
        &self,
        game_id: GameId,
        player_id: &str,
        map_id: MapId,
    ) -> Result<PickSnapshot>;

    /// Commit a selection resolution: sets `selected_map`, the completion
    /// flag, and the animation stamp, and persists any pick updates
    ///
    /// Conditional on the selection not being complete yet; `Skipped` when a
    /// concurrent resolver won the race.
    async fn resolve_map_selection(
        &self,
        game_id: GameId,
        resolution: MapResolution,
    ) -> Result<StatusChange>;

    /// Mark one player's acceptance of a completed game's result
    ///
    /// Fails `InvalidStateTransition` unless the game is `completed`,
    /// `NotFound` when the game or record is missing.
    async fn set_result_accepted(&self, game_id: GameId, player_id: &str) -> Result<Game>;

    /// Force-accept all outstanding results on a completed game (grace
    /// expiry); returns how many flags were newly set
    async fn accept_all_results(&self, game_id: GameId) -> Result<u32>;

    /// Refresh a team's stored average rating snapshot
    async fn update_team_average(
        &self,
        game_id: GameId,
        team_number: u32,
        average_rating: i32,
    ) -> Result<()>;

    /// Append an audit record; callers treat failures as best-effort
    async fn append_history(&self, event: HistoryEvent) -> Result<()>;

    async fn history_for_game(&self, game_id: GameId) -> Result<Vec<HistoryEvent>>;

    /// Current rating for a player, falling back to the base rating
    async fn get_rating(&self, player_id: &str) -> Result<i32>;

    /// Bulk rating lookup preserving input order
    async fn get_ratings(&self, player_ids: &[PlayerId]) -> Result<Vec<(PlayerId, i32)>>;

    /// Persist the rating movements of one completed match
    async fn apply_rating_changes(&self, changes: &[RatingChange]) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}
