//! Lifecycle controller
//!
//! Implements the game state machine over the store: queue creation, joins
//! with the automatic queue-to-lobby promotion, leaves and host disbands,
//! server assignment, result completion with rating application, and the
//! acceptance flow that eventually releases players to queue again.
//!
//! The store is the single writer of record; every operation here re-derives
//! state from it at call time and relies on the store's conditional updates
//! for race safety. History writes and event publishes happen after the
//! primary transition commits and never roll it back.

use crate::error::{GameError, Result};
use crate::lifecycle::teams::{assign_teams, build_teams};
use crate::maps::{MapSelectionCoordinator, SelectionProgress};
use crate::metrics::MetricsCollector;
use crate::rating::RatingEngine;
use crate::store::{GameStore, RemovalOutcome, StatusChange};
use crate::types::{
    CreateQueueRequest, Game, GameCancelled, GameCompleted, GameId, GamePlayer, GameSnapshot,
    GameStatus, HistoryEvent, HistoryEventKind, LobbyFormed, MapSelected, MatchRatingOutcome,
    PlayerId, PlayerJoined, PlayerLeft, QueueOpened,
};
use crate::utils;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How many times a promotion retries when the roster shifts between the
/// fill and the conditional lobby write
const LOBBY_PROMOTION_ATTEMPTS: u32 = 3;

/// Outcome of a join request
#[derive(Debug, Clone)]
pub enum JoinOutcome {
    /// The player was added; the game has not formed a lobby
    Queued { game: Game },
    /// This join (or a concurrent one) filled the queue; the lobby exists
    LobbyFormed { snapshot: GameSnapshot },
}

/// Outcome of a leave request
#[derive(Debug, Clone)]
pub enum LeaveOutcome {
    /// The host cancelled the whole game
    Disbanded { game: Game },
    /// One member was removed; the game stays open for the rest
    Left { game: Game },
    /// The game was already terminal by the time the request committed
    AlreadyClosed { game: Game },
}

/// Outcome of a match result report
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// First report for this game; ratings (when applicable) were applied
    Completed {
        game: Game,
        rating_outcome: Option<MatchRatingOutcome>,
    },
    /// Duplicate or late report; nothing changed
    AlreadyCompleted { game: Game },
}

/// The main lifecycle controller
#[derive(Clone)]
pub struct LifecycleController {
    /// Canonical game state
    store: Arc<dyn GameStore>,
    /// Pure rating calculations applied on completion
    rating_engine: Arc<dyn RatingEngine>,
    /// Map pick recording and resolution
    map_coordinator: Arc<MapSelectionCoordinator>,
    /// Event publisher for lifecycle events
    event_publisher: Arc<dyn crate::amqp::EventPublisher>,
    /// Metrics collector for recording lifecycle activity
    metrics: Arc<MetricsCollector>,
}

impl LifecycleController {
    /// Create a new controller with a default metrics collector
    pub fn new(
        store: Arc<dyn GameStore>,
        rating_engine: Arc<dyn RatingEngine>,
        map_coordinator: Arc<MapSelectionCoordinator>,
        event_publisher: Arc<dyn crate::amqp::EventPublisher>,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(
            store,
            rating_engine,
            map_coordinator,
            event_publisher,
            metrics,
        )
    }

    /// Create a new controller with an explicit metrics collector
    pub fn with_metrics(
        store: Arc<dyn GameStore>,
        rating_engine: Arc<dyn RatingEngine>,
        map_coordinator: Arc<MapSelectionCoordinator>,
        event_publisher: Arc<dyn crate::amqp::EventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            store,
            rating_engine,
            map_coordinator,
            event_publisher,
            metrics,
        }
    }

    /// Open a new queue with the requester as host and first player
    ///
    /// Fails `AlreadyInGame` when the host is still attached to any blocking
    /// game; the store enforces that inside the insert.
    pub async fn create_queue(&self, request: CreateQueueRequest) -> Result<Game> {
        info!(
            "Processing queue creation - host: '{}', mode: {}, selection: {}, ranked: {}",
            request.host_id, request.mode, request.selection_mode, request.ranked
        );

        let game = Game::new(request.host_id.clone(), &request);
        let host = GamePlayer::new(game.id, request.host_id.clone());
        let created = self.store.create_game(game, host).await?;

        self.record_history(
            created.id,
            &created.host_id,
            HistoryEventKind::Created,
            json!({
                "mode": created.mode,
                "selection_mode": created.selection_mode,
                "ranked": created.ranked,
            }),
        )
        .await;

        let event = QueueOpened {
            game_id: created.id,
            match_number: created.match_number,
            host_id: created.host_id.clone(),
            mode: created.mode,
            selection_mode: created.selection_mode,
            max_players: created.max_players,
            timestamp: utils::current_timestamp(),
        };
        if let Err(e) = self.event_publisher.publish_queue_opened(event).await {
            warn!("Failed to publish QueueOpened for game {}: {}", created.id, e);
        }

        self.metrics.record_queue_created(created.mode);
        info!(
            "Queue {} opened as match #{} with {} slots",
            created.id, created.match_number, created.max_players
        );
        Ok(created)
    }

    /// Add a player to an open queue, forming the lobby when the join fills
    /// the last slot
    pub async fn join_queue(
        &self,
        game_id: GameId,
        player_id: &str,
        password: Option<&str>,
    ) -> Result<JoinOutcome> {
        let game = self
            .store
            .get_game(game_id)
            .await?
            .ok_or_else(|| GameError::NotFound {
                what: format!("game {}", game_id),
            })?;

        // The password is immutable after creation, so checking it outside
        // the add's critical section cannot race a change
        if let Some(expected) = game.password.as_deref() {
            if password != Some(expected) {
                return Err(GameError::BadPassword {
                    game_id: game_id.to_string(),
                }
                .into());
            }
        }

        let joined = self
            .store
            .add_player(game_id, GamePlayer::new(game_id, player_id.to_string()))
            .await?;

        self.record_history(
            game_id,
            player_id,
            HistoryEventKind::Joined,
            json!({ "current_players": joined.game.current_players }),
        )
        .await;

        let event = PlayerJoined {
            game_id,
            player_id: player_id.to_string(),
            current_players: joined.game.current_players,
            max_players: joined.game.max_players,
            timestamp: utils::current_timestamp(),
        };
        if let Err(e) = self.event_publisher.publish_player_joined(event).await {
            warn!("Failed to publish PlayerJoined for game {}: {}", game_id, e);
        }
        self.metrics.record_player_joined();

        if joined.filled {
            info!(
                "Player '{}' filled game {} ({}/{}); forming lobby",
                player_id, game_id, joined.game.current_players, joined.game.max_players
            );
            return self.promote_to_lobby(game_id).await;
        }

        info!(
            "Player '{}' joined game {} ({}/{})",
            player_id, game_id, joined.game.current_players, joined.game.max_players
        );
        Ok(JoinOutcome::Queued { game: joined.game })
    }

    /// Convert a full queue into a lobby: split teams, snapshot averages,
    /// and roll the map when the selection mode calls for one
    ///
    /// Runs only on the join that observed the fill. Each attempt recomputes
    /// assignments from a fresh snapshot, so a leave-and-rejoin between the
    /// fill and the conditional write settles within the retry bound.
    async fn promote_to_lobby(&self, game_id: GameId) -> Result<JoinOutcome> {
        for attempt in 1..=LOBBY_PROMOTION_ATTEMPTS {
            let snapshot = self.fetch_snapshot(game_id).await?;
            let game = &snapshot.game;

            match game.status {
                GameStatus::Queue => {}
                // A concurrent promoter already won
                GameStatus::Lobby => return Ok(JoinOutcome::LobbyFormed { snapshot }),
                // Cancelled (or further along) between the fill and here
                _ => {
                    return Ok(JoinOutcome::Queued {
                        game: snapshot.game,
                    })
                }
            }
            if !game.is_full() {
                // A leave undid the fill; the queue keeps waiting
                return Ok(JoinOutcome::Queued {
                    game: snapshot.game,
                });
            }

            let assignments = assign_teams(&snapshot.players);
            let player_ids: Vec<PlayerId> = snapshot
                .players
                .iter()
                .map(|p| p.player_id.clone())
                .collect();
            let ratings = self.store.get_ratings(&player_ids).await?;
            let teams = build_teams(game_id, &assignments, &ratings, self.rating_engine.as_ref());
            let resolved_map = self
                .map_coordinator
                .roll_lobby_map(game.mode, game.selection_mode)?;

            match self
                .store
                .begin_lobby(game_id, game.max_players, teams, assignments, resolved_map)
                .await
            {
                Ok(StatusChange::Applied(_)) => return self.announce_lobby(game_id).await,
                Ok(StatusChange::Skipped(skipped)) => {
                    return if skipped.status == GameStatus::Lobby {
                        let snapshot = self.fetch_snapshot(game_id).await?;
                        Ok(JoinOutcome::LobbyFormed { snapshot })
                    } else {
                        Ok(JoinOutcome::Queued { game: skipped })
                    };
                }
                Err(e) if attempt < LOBBY_PROMOTION_ATTEMPTS => {
                    warn!(
                        "Lobby promotion for game {} lost a race (attempt {}): {}",
                        game_id, attempt, e
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(GameError::InternalError {
            message: format!("Lobby promotion did not settle for game {}", game_id),
        }
        .into())
    }

    /// Record and publish a freshly formed lobby
    async fn announce_lobby(&self, game_id: GameId) -> Result<JoinOutcome> {
        let snapshot = self.fetch_snapshot(game_id).await?;
        let game = &snapshot.game;

        info!(
            "Game {} (match #{}) promoted to lobby - {} players across {} teams, map: {}",
            game_id,
            game.match_number,
            snapshot.players.len(),
            snapshot.teams.len(),
            game.selected_map.as_deref().unwrap_or("pending")
        );

        self.record_history(
            game_id,
            &game.host_id,
            HistoryEventKind::LobbyFormed,
            json!({
                "teams": snapshot.teams.len(),
                "players": snapshot.players.len(),
                "selected_map": game.selected_map,
            }),
        )
        .await;

        let event = LobbyFormed {
            game_id,
            match_number: game.match_number,
            teams: snapshot.teams.clone(),
            players: snapshot.players.clone(),
            selected_map: game.selected_map.clone(),
            timestamp: utils::current_timestamp(),
        };
        if let Err(e) = self.event_publisher.publish_lobby_formed(event).await {
            warn!("Failed to publish LobbyFormed for game {}: {}", game_id, e);
        }

        // Random-map games carry their resolution from formation; announce
        // it here so clients can run the reveal
        if let (Some(map_id), Some(stamp)) =
            (game.selected_map.clone(), game.map_anim_select_start_time)
        {
            self.announce_map(game_id, &game.host_id, map_id, stamp, game.selection_mode)
                .await;
        }

        let fill_time = (utils::current_timestamp() - game.created_at)
            .to_std()
            .unwrap_or_default();
        self.metrics.record_lobby_formed(game.mode, fill_time);

        Ok(JoinOutcome::LobbyFormed { snapshot })
    }

    /// Remove the caller from their current queue or lobby: hosts disband
    /// the whole game, other members just leave
    pub async fn leave_or_disband(&self, player_id: &str) -> Result<LeaveOutcome> {
        let game = self
            .store
            .find_open_game(player_id)
            .await?
            .ok_or_else(|| GameError::NotInQueue {
                player_id: player_id.to_string(),
            })?;

        if game.host_id == player_id {
            self.disband(game, player_id).await
        } else {
            self.leave(game, player_id).await
        }
    }

    async fn disband(&self, game: Game, host_id: &str) -> Result<LeaveOutcome> {
        let game_id = game.id;
        match self.store.cancel_game(game_id).await? {
            StatusChange::Applied(cancelled) => {
                info!(
                    "Host '{}' disbanded game {} from {}",
                    host_id, game_id, game.status
                );
                let members = self
                    .store
                    .get_snapshot(game_id)
                    .await?
                    .map(|s| s.players)
                    .unwrap_or_default();
                for member in &members {
                    self.record_history(
                        game_id,
                        &member.player_id,
                        HistoryEventKind::Disband,
                        json!({ "cancelled_by": host_id }),
                    )
                    .await;
                }

                let event = GameCancelled {
                    game_id,
                    reason: HistoryEventKind::Disband,
                    timestamp: utils::current_timestamp(),
                };
                if let Err(e) = self.event_publisher.publish_game_cancelled(event).await {
                    warn!("Failed to publish GameCancelled for game {}: {}", game_id, e);
                }
                self.metrics.record_game_cancelled("disband");
                Ok(LeaveOutcome::Disbanded { game: cancelled })
            }
            StatusChange::Skipped(closed) => Ok(LeaveOutcome::AlreadyClosed { game: closed }),
        }
    }

    async fn leave(&self, game: Game, player_id: &str) -> Result<LeaveOutcome> {
        let game_id = game.id;
        match self.store.remove_player(game_id, player_id).await? {
            RemovalOutcome::Removed {
                game,
                removed,
                remaining,
            } => {
                info!(
                    "Player '{}' left game {} ({} remaining)",
                    player_id,
                    game_id,
                    remaining.len()
                );
                self.record_history(
                    game_id,
                    player_id,
                    HistoryEventKind::Left,
                    json!({ "remaining_players": remaining.len() }),
                )
                .await;

                // Leaving a formed lobby invalidates the stored team average
                if game.status == GameStatus::Lobby {
                    if let Some(team_number) = removed.team {
                        if let Err(e) = self
                            .refresh_team_average(game_id, team_number, &remaining)
                            .await
                        {
                            warn!(
                                "Failed to refresh team {} average for game {}: {}",
                                team_number, game_id, e
                            );
                        }
                    }
                }

                let event = PlayerLeft {
                    game_id,
                    player_id: player_id.to_string(),
                    current_players: game.current_players,
                    timestamp: utils::current_timestamp(),
                };
                if let Err(e) = self.event_publisher.publish_player_left(event).await {
                    warn!("Failed to publish PlayerLeft for game {}: {}", game_id, e);
                }
                self.metrics.record_player_left();
                Ok(LeaveOutcome::Left { game })
            }
            RemovalOutcome::NoOp(closed) => Ok(LeaveOutcome::AlreadyClosed { game: closed }),
        }
    }

    /// Record one player's map pick, announcing the resolution when this
    /// call is the one that committed it
    pub async fn select_map(
        &self,
        game_id: GameId,
        player_id: &str,
        map_id: &str,
    ) -> Result<SelectionProgress> {
        let progress = self
            .map_coordinator
            .select_map(game_id, player_id, map_id)
            .await?;

        match &progress {
            SelectionProgress::Pending {
                players_with_selections,
                total_players,
            } => {
                debug!(
                    "Map pick recorded for game {} ({}/{} players selected)",
                    game_id, players_with_selections, total_players
                );
            }
            SelectionProgress::Resolved {
                game,
                newly_resolved,
            } => {
                if *newly_resolved {
                    if let (Some(map_id), Some(stamp)) =
                        (game.selected_map.clone(), game.map_anim_select_start_time)
                    {
                        self.announce_map(game_id, player_id, map_id, stamp, game.selection_mode)
                            .await;
                    }
                }
            }
        }

        Ok(progress)
    }

    /// Record the allocated server and move the lobby into progress
    ///
    /// Duplicate assignment reports are skipped, matching the delivery
    /// guarantees of the allocation queue.
    pub async fn assign_server(&self, game_id: GameId, server: &str) -> Result<StatusChange> {
        let change = self.store.record_server_assignment(game_id, server).await?;
        match &change {
            StatusChange::Applied(game) => {
                info!(
                    "Server '{}' assigned to game {} (match #{}); match is live",
                    server, game_id, game.match_number
                );
                self.record_history(
                    game_id,
                    &game.host_id,
                    HistoryEventKind::ServerAssigned,
                    json!({ "server": server }),
                )
                .await;
            }
            StatusChange::Skipped(game) => {
                info!(
                    "Repeated server assignment for game {} (already {}); ignoring",
                    game_id, game.status
                );
            }
        }
        Ok(change)
    }

    /// Apply an authoritative match result: complete the game, move ratings
    /// for decisive ranked matches, and refresh team averages
    ///
    /// Idempotent: only the report that wins the status change applies
    /// ratings, so a redelivered result never moves ratings twice.
    pub async fn complete_game(
        &self,
        game_id: GameId,
        team1_score: u32,
        team2_score: u32,
    ) -> Result<CompletionOutcome> {
        let transition = self
            .store
            .transition_status(game_id, GameStatus::InProgress, GameStatus::Completed)
            .await?;
        let game = match transition {
            StatusChange::Applied(game) => game,
            StatusChange::Skipped(game) => {
                info!(
                    "Duplicate result report for game {} (already {}); ignoring",
                    game_id, game.status
                );
                return Ok(CompletionOutcome::AlreadyCompleted { game });
            }
        };

        info!(
            "Game {} (match #{}) completed {}:{}",
            game_id, game.match_number, team1_score, team2_score
        );

        let snapshot = self.fetch_snapshot(game_id).await?;
        let tie = team1_score == team2_score;
        let rating_outcome = if tie {
            info!("Game {} ended in a tie; ratings unchanged", game_id);
            None
        } else if !game.ranked {
            debug!("Game {} is unranked; ratings unchanged", game_id);
            None
        } else {
            Some(
                self.apply_ratings(&snapshot, team1_score > team2_score)
                    .await?,
            )
        };

        for player in &snapshot.players {
            let mut data = json!({
                "team1_score": team1_score,
                "team2_score": team2_score,
            });
            if let Some(outcome) = &rating_outcome {
                if let Some(rating_change) = outcome
                    .changes
                    .iter()
                    .find(|c| c.player_id == player.player_id)
                {
                    data["rating_delta"] = json!(rating_change.delta);
                }
            }
            self.record_history(
                game_id,
                &player.player_id,
                HistoryEventKind::MatchCompleted,
                data,
            )
            .await;
        }

        let event = GameCompleted {
            game_id,
            match_number: game.match_number,
            team1_score,
            team2_score,
            rating_changes: rating_outcome
                .as_ref()
                .map(|o| o.changes.clone())
                .unwrap_or_default(),
            timestamp: utils::current_timestamp(),
        };
        if let Err(e) = self.event_publisher.publish_game_completed(event).await {
            warn!("Failed to publish GameCompleted for game {}: {}", game_id, e);
        }
        self.metrics.record_game_completed(tie);

        Ok(CompletionOutcome::Completed {
            game,
            rating_outcome,
        })
    }

    /// Set one player's acceptance flag on a completed game
    ///
    /// Once accepted, the game stops blocking that player from queuing.
    pub async fn accept_match_result(&self, game_id: GameId, player_id: &str) -> Result<Game> {
        let game = self.store.set_result_accepted(game_id, player_id).await?;
        self.record_history(
            game_id,
            player_id,
            HistoryEventKind::ResultAccepted,
            json!({ "auto": false }),
        )
        .await;
        info!(
            "Player '{}' accepted the result of game {}",
            player_id, game_id
        );
        Ok(game)
    }

    /// Cancel one inactive queue on behalf of the sweep
    ///
    /// Returns whether this call cancelled the game. Queues that progressed
    /// to a lobby since the sweep's scan are left alone.
    pub async fn timeout_queue(&self, game_id: GameId) -> Result<bool> {
        let change = match self
            .store
            .transition_status(game_id, GameStatus::Queue, GameStatus::Cancelled)
            .await
        {
            Ok(change) => change,
            Err(e) => {
                return match e.downcast_ref::<GameError>() {
                    Some(GameError::InvalidStateTransition { .. }) => Ok(false),
                    _ => Err(e),
                };
            }
        };

        match change {
            StatusChange::Applied(game) => {
                info!("Swept inactive queue {} (match #{})", game_id, game.match_number);
                let members = self
                    .store
                    .get_snapshot(game_id)
                    .await?
                    .map(|s| s.players)
                    .unwrap_or_default();
                for member in &members {
                    self.record_history(
                        game_id,
                        &member.player_id,
                        HistoryEventKind::Timeout,
                        json!({ "reason": "inactivity" }),
                    )
                    .await;
                }

                let event = GameCancelled {
                    game_id,
                    reason: HistoryEventKind::Timeout,
                    timestamp: utils::current_timestamp(),
                };
                if let Err(e) = self.event_publisher.publish_game_cancelled(event).await {
                    warn!("Failed to publish GameCancelled for game {}: {}", game_id, e);
                }
                self.metrics.record_game_cancelled("timeout");
                Ok(true)
            }
            StatusChange::Skipped(_) => Ok(false),
        }
    }

    /// Force-accept all outstanding results on a completed game once the
    /// acceptance grace has expired; returns how many flags were newly set
    pub async fn expire_result_acceptance(&self, game_id: GameId) -> Result<u32> {
        let newly_accepted = self.store.accept_all_results(game_id).await?;
        if newly_accepted > 0 {
            info!(
                "Acceptance grace expired for game {}; auto-accepted {} outstanding results",
                game_id, newly_accepted
            );
            if let Some(game) = self.store.get_game(game_id).await? {
                self.record_history(
                    game_id,
                    &game.host_id,
                    HistoryEventKind::ResultAccepted,
                    json!({ "auto": true, "newly_accepted": newly_accepted }),
                )
                .await;
            }
        }
        Ok(newly_accepted)
    }

    /// The game currently blocking this player from queuing, with players
    /// and teams
    pub async fn current_game(&self, player_id: &str) -> Result<Option<GameSnapshot>> {
        match self.store.find_blocking_game(player_id).await? {
            Some(game) => self.store.get_snapshot(game.id).await,
            None => Ok(None),
        }
    }

    /// All games currently accepting joiners
    pub async fn active_queues(&self) -> Result<Vec<Game>> {
        self.store.list_by_status(GameStatus::Queue).await
    }

    /// Full view of one game
    pub async fn game_details(&self, game_id: GameId) -> Result<Option<GameSnapshot>> {
        self.store.get_snapshot(game_id).await
    }

    async fn apply_ratings(
        &self,
        snapshot: &GameSnapshot,
        team1_won: bool,
    ) -> Result<MatchRatingOutcome> {
        let game_id = snapshot.game.id;
        let player_ids: Vec<PlayerId> = snapshot
            .players
            .iter()
            .filter(|p| p.team.is_some())
            .map(|p| p.player_id.clone())
            .collect();
        let ratings = self.store.get_ratings(&player_ids).await?;

        let mut team1: Vec<(PlayerId, i32)> = Vec::new();
        let mut team2: Vec<(PlayerId, i32)> = Vec::new();
        for player in &snapshot.players {
            if let Some(team) = player.team {
                if let Some((_, rating)) = ratings.iter().find(|(id, _)| *id == player.player_id) {
                    match team {
                        1 => team1.push((player.player_id.clone(), *rating)),
                        2 => team2.push((player.player_id.clone(), *rating)),
                        other => warn!(
                            "Player '{}' in game {} has unexpected team {}",
                            player.player_id, game_id, other
                        ),
                    }
                }
            }
        }

        let (winners, losers) = if team1_won {
            (team1, team2)
        } else {
            (team2, team1)
        };

        let start = Instant::now();
        let outcome = self.rating_engine.process_match(&winners, &losers);
        self.metrics.record_rating_calculation(start.elapsed());

        self.store.apply_rating_changes(&outcome.changes).await?;

        // Refresh the stored averages from the post-match ratings
        for team in &snapshot.teams {
            let new_ratings: Vec<i32> = snapshot
                .players
                .iter()
                .filter(|p| p.team == Some(team.number))
                .filter_map(|p| {
                    outcome
                        .changes
                        .iter()
                        .find(|c| c.player_id == p.player_id)
                        .map(|c| c.new_rating)
                })
                .collect();
            let average = self.rating_engine.team_average(&new_ratings);
            if let Err(e) = self
                .store
                .update_team_average(game_id, team.number, average)
                .await
            {
                warn!(
                    "Failed to refresh team {} average for game {}: {}",
                    team.number, game_id, e
                );
            }
        }

        info!(
            "Ratings applied for game {} - winner avg {}, loser avg {}, {} players moved",
            game_id,
            outcome.winning_team_average,
            outcome.losing_team_average,
            outcome.changes.len()
        );
        Ok(outcome)
    }

    async fn refresh_team_average(
        &self,
        game_id: GameId,
        team_number: u32,
        remaining: &[GamePlayer],
    ) -> Result<()> {
        let member_ids: Vec<PlayerId> = remaining
            .iter()
            .filter(|p| p.team == Some(team_number))
            .map(|p| p.player_id.clone())
            .collect();
        let ratings = self.store.get_ratings(&member_ids).await?;
        let values: Vec<i32> = ratings.iter().map(|(_, rating)| *rating).collect();
        let average = self.rating_engine.team_average(&values);
        self.store
            .update_team_average(game_id, team_number, average)
            .await?;
        debug!(
            "Team {} average for game {} refreshed to {} after roster change",
            team_number, game_id, average
        );
        Ok(())
    }

    async fn announce_map(
        &self,
        game_id: GameId,
        player_id: &str,
        map_id: String,
        anim_select_start_time: i64,
        selection_mode: crate::types::MapSelectionMode,
    ) {
        info!(
            "Map '{}' locked for game {} ({} selection)",
            map_id, game_id, selection_mode
        );
        self.record_history(
            game_id,
            player_id,
            HistoryEventKind::MapSelected,
            json!({ "map_id": map_id }),
        )
        .await;

        let event = MapSelected {
            game_id,
            map_id,
            anim_select_start_time,
            reveal_duration_ms: self.map_coordinator.reveal_window().as_millis() as i64,
            timestamp: utils::current_timestamp(),
        };
        if let Err(e) = self.event_publisher.publish_map_selected(event).await {
            warn!("Failed to publish MapSelected for game {}: {}", game_id, e);
        }
        self.metrics.record_map_selected(selection_mode);
    }

    async fn fetch_snapshot(&self, game_id: GameId) -> Result<GameSnapshot> {
        let snapshot =
            self.store
                .get_snapshot(game_id)
                .await?
                .ok_or_else(|| GameError::NotFound {
                    what: format!("game {}", game_id),
                })?;
        Ok(snapshot)
    }

    async fn record_history(
        &self,
        game_id: GameId,
        player_id: &str,
        kind: HistoryEventKind,
        event_data: serde_json::Value,
    ) {
        let event = HistoryEvent::new(game_id, player_id.to_string(), kind, event_data);
        if let Err(e) = self.store.append_history(event).await {
            warn!(
                "Failed to record {} history for game {}: {}",
                kind, game_id, e
            );
        }
    }
}
