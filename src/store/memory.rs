//! In-memory game store backend
//!
//! All entities live behind one `RwLock` so every conditional update sees a
//! consistent view of games, player records, and teams in a single critical
//! section. No method holds the lock across an await point.

use crate::error::{GameError, Result};
use crate::store::game_store::{
    GameStore, JoinedGame, MapResolution, PickSnapshot, RemovalOutcome, StatusChange, StoreStats,
};
use crate::types::{
    Game, GameId, GamePlayer, GameSnapshot, GameStatus, HistoryEvent, MapId, PlayerId,
    RatingChange, Team, DEFAULT_RATING,
};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct StoreInner {
    games: HashMap<GameId, Game>,
    /// Player records per game, ordered by join time
    players: HashMap<GameId, Vec<GamePlayer>>,
    teams: HashMap<GameId, Vec<Team>>,
    history: HashMap<GameId, Vec<HistoryEvent>>,
    ratings: HashMap<PlayerId, i32>,
    next_match_number: u64,
}

impl StoreInner {
    /// Whether this game currently blocks the given player from queuing
    fn blocks_player(&self, game: &Game, player_id: &str) -> bool {
        let Some(records) = self.players.get(&game.id) else {
            return false;
        };
        let Some(record) = records.iter().find(|p| p.player_id == player_id) else {
            return false;
        };

        match game.status {
            GameStatus::Queue | GameStatus::Lobby | GameStatus::InProgress => true,
            GameStatus::Completed => !record.accepted_result,
            GameStatus::Cancelled => false,
        }
    }

    fn blocking_game(&self, player_id: &str) -> Option<&Game> {
        self.games
            .values()
            .find(|game| self.blocks_player(game, player_id))
    }
}

/// In-memory implementation of [`GameStore`]
///
/// The backend of record for tests and the queue-tester binary; a durable
/// backend plugs in behind the same trait.
#[derive(Default)]
pub struct MemoryGameStore {
    inner: RwLock<StoreInner>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                next_match_number: 1,
                ..StoreInner::default()
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreInner>> {
        self.inner.read().map_err(|_| {
            GameError::InternalError {
                message: "Failed to acquire store lock".to_string(),
            }
            .into()
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreInner>> {
        self.inner.write().map_err(|_| {
            GameError::InternalError {
                message: "Failed to acquire store lock".to_string(),
            }
            .into()
        })
    }
}

fn not_found(game_id: GameId) -> GameError {
    GameError::NotFound {
        what: format!("game {}", game_id),
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn create_game(&self, mut game: Game, host: GamePlayer) -> Result<Game> {
        let mut inner = self.write()?;

        if inner.blocking_game(&host.player_id).is_some() {
            return Err(GameError::AlreadyInGame {
                player_id: host.player_id.clone(),
            }
            .into());
        }

        game.match_number = inner.next_match_number;
        inner.next_match_number += 1;

        let game_id = game.id;
        inner.games.insert(game_id, game.clone());
        inner.players.insert(game_id, vec![host]);

        Ok(game)
    }

    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>> {
        let inner = self.read()?;
        Ok(inner.games.get(&game_id).cloned())
    }

    async fn get_snapshot(&self, game_id: GameId) -> Result<Option<GameSnapshot>> {
        let inner = self.read()?;
        let Some(game) = inner.games.get(&game_id) else {
            return Ok(None);
        };

        Ok(Some(GameSnapshot {
            game: game.clone(),
            players: inner.players.get(&game_id).cloned().unwrap_or_default(),
            teams: inner.teams.get(&game_id).cloned().unwrap_or_default(),
        }))
    }

    async fn find_blocking_game(&self, player_id: &str) -> Result<Option<Game>> {
        let inner = self.read()?;
        Ok(inner.blocking_game(player_id).cloned())
    }

    async fn find_open_game(&self, player_id: &str) -> Result<Option<Game>> {
        let inner = self.read()?;
        let game = inner.games.values().find(|game| {
            matches!(game.status, GameStatus::Queue | GameStatus::Lobby)
                && inner
                    .players
                    .get(&game.id)
                    .is_some_and(|records| records.iter().any(|p| p.player_id == player_id))
        });
        Ok(game.cloned())
    }

    async fn list_by_status(&self, status: GameStatus) -> Result<Vec<Game>> {
        let inner = self.read()?;
        let mut games: Vec<Game> = inner
            .games
            .values()
            .filter(|game| game.status == status)
            .cloned()
            .collect();
        games.sort_by_key(|game| game.match_number);
        Ok(games)
    }

    async fn add_player(&self, game_id: GameId, player: GamePlayer) -> Result<JoinedGame> {
        let mut inner = self.write()?;

        {
            let game = inner.games.get(&game_id).ok_or_else(|| not_found(game_id))?;
            match game.status {
                GameStatus::Queue => {}
                GameStatus::Lobby | GameStatus::InProgress => {
                    return Err(GameError::QueueFull {
                        game_id: game_id.to_string(),
                    }
                    .into());
                }
                GameStatus::Completed | GameStatus::Cancelled => {
                    return Err(not_found(game_id).into());
                }
            }
            if game.current_players >= game.max_players {
                return Err(GameError::QueueFull {
                    game_id: game_id.to_string(),
                }
                .into());
            }
        }

        // One non-terminal game per player, enforced here rather than by
        // callers so racing operations cannot slip past the check
        if inner.blocking_game(&player.player_id).is_some() {
            return Err(GameError::AlreadyInGame {
                player_id: player.player_id.clone(),
            }
            .into());
        }

        let inner = &mut *inner;
        let game = inner
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found(game_id))?;
        let records = inner.players.entry(game_id).or_default();

        records.push(player);
        game.current_players += 1;
        game.updated_at = current_timestamp();

        Ok(JoinedGame {
            filled: game.current_players == game.max_players,
            game: game.clone(),
        })
    }

    async fn begin_lobby(
        &self,
        game_id: GameId,
        expected_players: u32,
        teams: Vec<Team>,
        assignments: Vec<(PlayerId, u32)>,
        resolved_map: Option<MapResolution>,
    ) -> Result<StatusChange> {
        let mut inner = self.write()?;

        {
            let game = inner.games.get(&game_id).ok_or_else(|| not_found(game_id))?;
            if game.status.is_terminal() || game.status == GameStatus::Lobby {
                return Ok(StatusChange::Skipped(game.clone()));
            }
            if game.status != GameStatus::Queue || game.current_players != expected_players {
                return Err(GameError::InvalidStateTransition {
                    from: game.status.to_string(),
                    to: GameStatus::Lobby.to_string(),
                }
                .into());
            }

            // The assignment set must exactly match current membership;
            // a leave/rejoin between the fill and this commit shows up here
            let records = inner.players.get(&game_id).map(Vec::as_slice).unwrap_or(&[]);
            let membership_matches = records.len() == assignments.len()
                && assignments
                    .iter()
                    .all(|(id, _)| records.iter().any(|p| &p.player_id == id));
            if !membership_matches {
                return Err(GameError::InvalidStateTransition {
                    from: game.status.to_string(),
                    to: GameStatus::Lobby.to_string(),
                }
                .into());
            }
        }

        let inner = &mut *inner;
        let game = inner
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found(game_id))?;
        let records = inner.players.entry(game_id).or_default();

        for (player_id, team_number) in &assignments {
            if let Some(record) = records.iter_mut().find(|p| &p.player_id == player_id) {
                record.team = Some(*team_number);
            }
        }

        game.status = GameStatus::Lobby;
        game.updated_at = current_timestamp();
        if let Some(resolution) = resolved_map {
            game.selected_map = Some(resolution.map_id);
            game.map_selection_complete = true;
            game.map_anim_select_start_time = Some(resolution.anim_select_start_time);
        }

        inner.teams.insert(game_id, teams);

        Ok(StatusChange::Applied(game.clone()))
    }

    async fn remove_player(&self, game_id: GameId, player_id: &str) -> Result<RemovalOutcome> {
        let mut inner = self.write()?;

        {
            let game = inner.games.get(&game_id).ok_or_else(|| not_found(game_id))?;
            if game.status.is_terminal() {
                return Ok(RemovalOutcome::NoOp(game.clone()));
            }
        }

        let inner = &mut *inner;
        let game = inner
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found(game_id))?;
        let records = inner.players.entry(game_id).or_default();

        let Some(position) = records.iter().position(|p| p.player_id == player_id) else {
            return Ok(RemovalOutcome::NoOp(game.clone()));
        };

        let removed = records.remove(position);
        game.current_players = game.current_players.saturating_sub(1);
        game.updated_at = current_timestamp();

        Ok(RemovalOutcome::Removed {
            game: game.clone(),
            removed,
            remaining: records.clone(),
        })
    }

    async fn transition_status(
        &self,
        game_id: GameId,
        from: GameStatus,
        to: GameStatus,
    ) -> Result<StatusChange> {
        let mut inner = self.write()?;
        let game = inner
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found(game_id))?;

        if game.status == to || game.status.is_terminal() {
            return Ok(StatusChange::Skipped(game.clone()));
        }
        if game.status != from || !from.can_transition_to(to) {
            return Err(GameError::InvalidStateTransition {
                from: game.status.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        game.status = to;
        game.updated_at = current_timestamp();
        Ok(StatusChange::Applied(game.clone()))
    }

    async fn cancel_game(&self, game_id: GameId) -> Result<StatusChange> {
        let mut inner = self.write()?;
        let game = inner
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found(game_id))?;

        match game.status {
            GameStatus::Queue | GameStatus::Lobby => {
                game.status = GameStatus::Cancelled;
                game.updated_at = current_timestamp();
                Ok(StatusChange::Applied(game.clone()))
            }
            GameStatus::Completed | GameStatus::Cancelled => {
                Ok(StatusChange::Skipped(game.clone()))
            }
            GameStatus::InProgress => Err(GameError::InvalidStateTransition {
                from: game.status.to_string(),
                to: GameStatus::Cancelled.to_string(),
            }
            .into()),
        }
    }

    async fn record_server_assignment(
        &self,
        game_id: GameId,
        server: &str,
    ) -> Result<StatusChange> {
        let mut inner = self.write()?;
        let game = inner
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found(game_id))?;

        match game.status {
            GameStatus::Lobby => {
                game.server = Some(server.to_string());
                game.status = GameStatus::InProgress;
                game.updated_at = current_timestamp();
                Ok(StatusChange::Applied(game.clone()))
            }
            GameStatus::InProgress | GameStatus::Completed | GameStatus::Cancelled => {
                Ok(StatusChange::Skipped(game.clone()))
            }
            GameStatus::Queue => Err(GameError::InvalidStateTransition {
                from: game.status.to_string(),
                to: GameStatus::InProgress.to_string(),
            }
            .into()),
        }
    }

    async fn record_map_pick(
        &self,
        game_id: GameId,
        player_id: &str,
        map_id: MapId,
    ) -> Result<PickSnapshot> {
        let mut inner = self.write()?;

        {
            let game = inner.games.get(&game_id).ok_or_else(|| not_found(game_id))?;
            if game.map_selection_complete {
                return Err(GameError::SelectionAlreadyComplete {
                    game_id: game_id.to_string(),
                }
                .into());
            }
            if game.status != GameStatus::Lobby {
                return Err(GameError::InvalidStateTransition {
                    from: game.status.to_string(),
                    to: GameStatus::Lobby.to_string(),
                }
                .into());
            }
        }

        let inner = &mut *inner;
        let game = inner
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found(game_id))?;
        let records = inner.players.entry(game_id).or_default();

        let Some(record) = records.iter_mut().find(|p| p.player_id == player_id) else {
            return Err(GameError::NotFound {
                what: format!("player {} in game {}", player_id, game_id),
            }
            .into());
        };

        // Last writer wins until resolution commits
        record.map_selection = Some(map_id);
        game.updated_at = current_timestamp();

        Ok(PickSnapshot {
            game: game.clone(),
            players: records.clone(),
        })
    }

    async fn resolve_map_selection(
        &self,
        game_id: GameId,
        resolution: MapResolution,
    ) -> Result<StatusChange> {
        let mut inner = self.write()?;

        {
            let game = inner.games.get(&game_id).ok_or_else(|| not_found(game_id))?;
            if game.map_selection_complete || game.status.is_terminal() {
                return Ok(StatusChange::Skipped(game.clone()));
            }
        }

        let inner = &mut *inner;
        let game = inner
            .games
            .get_mut(&game_id)
            .ok_or_else(|| not_found(game_id))?;
        let records = inner.players.entry(game_id).or_default();

        for (player_id, map_id) in &resolution.pick_updates {
            if let Some(record) = records.iter_mut().find(|p| &p.player_id == player_id) {
                record.map_selection = Some(map_id.clone());
            }
        }

        game.selected_map = Some(resolution.map_id);
        game.map_selection_complete = true;
        game.map_anim_select_start_time = Some(resolution.anim_select_start_time);
        game.updated_at = current_timestamp();

        Ok(StatusChange::Applied(game.clone()))
    }

    async fn set_result_accepted(&self, game_id: GameId, player_id: &str) -> Result<Game> {
        let mut inner = self.write()?;

        {
            let game = inner.games.get(&game_id).ok_or_else(|| not_found(game_id))?;
            if game.status != GameStatus::Completed {
                return Err(GameError::InvalidStateTransition {
                    from: game.status.to_string(),
                    to: GameStatus::Completed.to_string(),
                }
                .into());
            }
        }

        let inner = &mut *inner;
        let game = inner
            .games
            .get(&game_id)
            .ok_or_else(|| not_found(game_id))?
            .clone();
        let records = inner.players.entry(game_id).or_default();

        let Some(record) = records.iter_mut().find(|p| p.player_id == player_id) else {
            return Err(GameError::NotFound {
                what: format!("player {} in game {}", player_id, game_id),
            }
            .into());
        };

        record.accepted_result = true;
        Ok(game)
    }

    async fn accept_all_results(&self, game_id: GameId) -> Result<u32> {
        let mut inner = self.write()?;

        {
            let game = inner.games.get(&game_id).ok_or_else(|| not_found(game_id))?;
            if game.status != GameStatus::Completed {
                return Err(GameError::InvalidStateTransition {
                    from: game.status.to_string(),
                    to: GameStatus::Completed.to_string(),
                }
                .into());
            }
        }

        let mut newly_set = 0;
        for record in inner.players.entry(game_id).or_default().iter_mut() {
            if !record.accepted_result {
                record.accepted_result = true;
                newly_set += 1;
            }
        }
        Ok(newly_set)
    }

    async fn update_team_average(
        &self,
        game_id: GameId,
        team_number: u32,
        average_rating: i32,
    ) -> Result<()> {
        let mut inner = self.write()?;

        let Some(teams) = inner.teams.get_mut(&game_id) else {
            return Err(not_found(game_id).into());
        };
        let Some(team) = teams.iter_mut().find(|t| t.number == team_number) else {
            return Err(GameError::NotFound {
                what: format!("team {} in game {}", team_number, game_id),
            }
            .into());
        };

        team.average_rating = average_rating;
        Ok(())
    }

    async fn append_history(&self, event: HistoryEvent) -> Result<()> {
        let mut inner = self.write()?;
        inner.history.entry(event.game_id).or_default().push(event);
        Ok(())
    }

    async fn history_for_game(&self, game_id: GameId) -> Result<Vec<HistoryEvent>> {
        let inner = self.read()?;
        Ok(inner.history.get(&game_id).cloned().unwrap_or_default())
    }

    async fn get_rating(&self, player_id: &str) -> Result<i32> {
        let inner = self.read()?;
        Ok(inner.ratings.get(player_id).copied().unwrap_or(DEFAULT_RATING))
    }

    async fn get_ratings(&self, player_ids: &[PlayerId]) -> Result<Vec<(PlayerId, i32)>> {
        let inner = self.read()?;
        Ok(player_ids
            .iter()
            .map(|id| {
                (
                    id.clone(),
                    inner.ratings.get(id).copied().unwrap_or(DEFAULT_RATING),
                )
            })
            .collect())
    }

    async fn apply_rating_changes(&self, changes: &[RatingChange]) -> Result<()> {
        let mut inner = self.write()?;
        for change in changes {
            inner
                .ratings
                .insert(change.player_id.clone(), change.new_rating);
        }
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let inner = self.read()?;
        let mut stats = StoreStats {
            players_in_games: inner.players.values().map(Vec::len).sum(),
            rated_players: inner.ratings.len(),
            history_events: inner.history.values().map(Vec::len).sum(),
            ..StoreStats::default()
        };

        for game in inner.games.values() {
            match game.status {
                GameStatus::Queue => stats.queued_games += 1,
                GameStatus::Lobby => stats.lobby_games += 1,
                GameStatus::InProgress => stats.in_progress_games += 1,
                GameStatus::Completed => stats.completed_games += 1,
                GameStatus::Cancelled => stats.cancelled_games += 1,
            }
        }

        Ok(stats)
    }
}
