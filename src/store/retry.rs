//! Retry and deadline wrapper for store backends
//!
//! Domain outcomes (`GameError`) pass straight through: the core never
//! auto-retries expected failures. Anything else coming out of a backend is
//! treated as a transient storage fault, retried with capped exponential
//! backoff, and surfaced as `StorageUnavailable` once attempts run out.
//! Every attempt runs under a bounded deadline so a stuck backend cannot
//! hang a caller.

use crate::error::{GameError, Result};
use crate::store::game_store::{
    GameStore, JoinedGame, MapResolution, PickSnapshot, RemovalOutcome, StatusChange, StoreStats,
};
use crate::types::{
    Game, GameId, GamePlayer, GameSnapshot, GameStatus, HistoryEvent, MapId, PlayerId,
    RatingChange, Team,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::warn;

/// Retry behavior for one store boundary
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Per-attempt deadline for a single backend call
    pub call_deadline_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 50,
            max_delay_ms: 1000,
            call_deadline_ms: 2000,
        }
    }
}

/// Store decorator applying [`RetryPolicy`] to every call
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    async fn execute<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let deadline = Duration::from_millis(self.policy.call_deadline_ms);
        let mut delay = Duration::from_millis(self.policy.initial_delay_ms);
        let mut last_failure = String::new();

        for attempt in 1..=self.policy.max_attempts {
            match timeout(deadline, attempt_fn()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => {
                    // Expected lifecycle outcomes are not storage faults
                    if err.downcast_ref::<GameError>().is_some() {
                        return Err(err);
                    }
                    last_failure = err.to_string();
                }
                Err(_) => {
                    last_failure = format!("deadline of {:?} exceeded", deadline);
                }
            }

            if attempt < self.policy.max_attempts {
                warn!(
                    "Store call {} failed (attempt {}): {}. Retrying in {:?}",
                    operation, attempt, last_failure, delay
                );
                sleep(delay).await;
                delay =
                    Duration::from_millis((delay.as_millis() as u64 * 2).min(self.policy.max_delay_ms));
            }
        }

        Err(GameError::StorageUnavailable {
            attempts: self.policy.max_attempts,
            message: format!("{}: {}", operation, last_failure),
        }
        .into())
    }
}

#[async_trait]
impl<S: GameStore> GameStore for RetryingStore<S> {
    async fn create_game(&self, game: Game, host: GamePlayer) -> Result<Game> {
        self.execute("create_game", || {
            self.inner.create_game(game.clone(), host.clone())
        })
        .await
    }

    async fn get_game(&self, game_id: GameId) -> Result<Option<Game>> {
        self.execute("get_game", || self.inner.get_game(game_id))
            .await
    }

    async fn get_snapshot(&self, game_id: GameId) -> Result<Option<GameSnapshot>> {
        self.execute("get_snapshot", || self.inner.get_snapshot(game_id))
            .await
    }

    async fn find_blocking_game(&self, player_id: &str) -> Result<Option<Game>> {
        self.execute("find_blocking_game", || {
            self.inner.find_blocking_game(player_id)
        })
        .await
    }

    async fn find_open_game(&self, player_id: &str) -> Result<Option<Game>> {
        self.execute("find_open_game", || self.inner.find_open_game(player_id))
            .await
    }

    async fn list_by_status(&self, status: GameStatus) -> Result<Vec<Game>> {
        self.execute("list_by_status", || self.inner.list_by_status(status))
            .await
    }

    async fn add_player(&self, game_id: GameId, player: GamePlayer) -> Result<JoinedGame> {
        self.execute("add_player", || {
            self.inner.add_player(game_id, player.clone())
        })
        .await
    }

    async fn begin_lobby(
        &self,
        game_id: GameId,
        expected_players: u32,
        teams: Vec<Team>,
        assignments: Vec<(PlayerId, u32)>,
        resolved_map: Option<MapResolution>,
    ) -> Result<StatusChange> {
        self.execute("begin_lobby", || {
            self.inner.begin_lobby(
                game_id,
                expected_players,
                teams.clone(),
                assignments.clone(),
                resolved_map.clone(),
            )
        })
        .await
    }

    async fn remove_player(&self, game_id: GameId, player_id: &str) -> Result<RemovalOutcome> {
        self.execute("remove_player", || {
            self.inner.remove_player(game_id, player_id)
        })
        .await
    }

    async fn transition_status(
        &self,
        game_id: GameId,
        from: GameStatus,
        to: GameStatus,
    ) -> Result<StatusChange> {
        self.execute("transition_status", || {
            self.inner.transition_status(game_id, from, to)
        })
        .await
    }

    async fn cancel_game(&self, game_id: GameId) -> Result<StatusChange> {
        self.execute("cancel_game", || self.inner.cancel_game(game_id))
            .await
    }

    async fn record_server_assignment(
        &self,
        game_id: GameId,
        server: &str,
    ) -> Result<StatusChange> {
        self.execute("record_server_assignment", || {
            self.inner.record_server_assignment(game_id, server)
        })
        .await
    }

    async fn record_map_pick(
        &self,
        game_id: GameId,
        player_id: &str,
        map_id: MapId,
    ) -> Result<PickSnapshot> {
        self.execute("record_map_pick", || {
            self.inner.record_map_pick(game_id, player_id, map_id.clone())
        })
        .await
    }

    async fn resolve_map_selection(
        &self,
        game_id: GameId,
        resolution: MapResolution,
    ) -> Result<StatusChange> {
        self.execute("resolve_map_selection", || {
            self.inner.resolve_map_selection(game_id, resolution.clone())
        })
        .await
    }

    async fn set_result_accepted(&self, game_id: GameId, player_id: &str) -> Result<Game> {
        self.execute("set_result_accepted", || {
            self.inner.set_result_accepted(game_id, player_id)
        })
        .await
    }

    async fn accept_all_results(&self, game_id: GameId) -> Result<u32> {
        self.execute("accept_all_results", || {
            self.inner.accept_all_results(game_id)
        })
        .await
    }

    async fn update_team_average(
        &self,
        game_id: GameId,
        team_number: u32,
        average_rating: i32,
    ) -> Result<()> {
        self.execute("update_team_average", || {
            self.inner
                .update_team_average(game_id, team_number, average_rating)
        })
        .await
    }

    async fn append_history(&self, event: HistoryEvent) -> Result<()> {
        self.execute("append_history", || self.inner.append_history(event.clone()))
            .await
    }

    async fn history_for_game(&self, game_id: GameId) -> Result<Vec<HistoryEvent>> {
        self.execute("history_for_game", || self.inner.history_for_game(game_id))
            .await
    }

    async fn get_rating(&self, player_id: &str) -> Result<i32> {
        self.execute("get_rating", || self.inner.get_rating(player_id))
            .await
    }

    async fn get_ratings(&self, player_ids: &[PlayerId]) -> Result<Vec<(PlayerId, i32)>> {
        self.execute("get_ratings", || self.inner.get_ratings(player_ids))
            .await
    }

    async fn apply_rating_changes(&self, changes: &[RatingChange]) -> Result<()> {
        self.execute("apply_rating_changes", || {
            self.inner.apply_rating_changes(changes)
        })
        .await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.execute("stats", || self.inner.stats()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryGameStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 4,
            call_deadline_ms: 50,
        }
    }

    #[tokio::test]
    async fn test_transient_errors_retried_until_success() {
        let store = RetryingStore::new(MemoryGameStore::new(), fast_policy());
        let calls = AtomicU32::new(0);

        let result: Result<u32> = store
            .execute("flaky", || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 3 {
                        Err(anyhow::anyhow!("connection reset"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_surfaces_storage_unavailable() {
        let store = RetryingStore::new(MemoryGameStore::new(), fast_policy());
        let calls = AtomicU32::new(0);

        let result: Result<()> = store
            .execute("down", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(anyhow::anyhow!("connection refused")) }
            })
            .await;

        let err = result.unwrap_err();
        match err.downcast_ref::<GameError>() {
            Some(GameError::StorageUnavailable { attempts, .. }) => assert_eq!(*attempts, 3),
            other => panic!("expected StorageUnavailable, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_domain_errors_pass_through_without_retry() {
        let store = RetryingStore::new(MemoryGameStore::new(), fast_policy());
        let calls = AtomicU32::new(0);

        let result: Result<()> = store
            .execute("domain", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(GameError::QueueFull {
                        game_id: "g".to_string(),
                    }
                    .into())
                }
            })
            .await;

        assert!(matches!(
            result.unwrap_err().downcast_ref::<GameError>(),
            Some(GameError::QueueFull { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1, "no retry for domain errors");
    }

    #[tokio::test]
    async fn test_deadline_counts_as_transient() {
        let policy = RetryPolicy {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            call_deadline_ms: 10,
        };
        let store = RetryingStore::new(MemoryGameStore::new(), policy);

        let result: Result<()> = store
            .execute("stuck", || async {
                sleep(Duration::from_millis(100)).await;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        match err.downcast_ref::<GameError>() {
            Some(GameError::StorageUnavailable { message, .. }) => {
                assert!(message.contains("deadline"));
            }
            other => panic!("expected StorageUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrapped_store_still_serves_domain_calls() {
        let store = RetryingStore::new(MemoryGameStore::new(), RetryPolicy::default());
        let request = crate::types::CreateQueueRequest {
            host_id: "alice".to_string(),
            mode: crate::types::GameMode::Duel,
            selection_mode: crate::types::MapSelectionMode::HostPick,
            server: None,
            password: None,
            ranked: false,
            scheduled_start: None,
        };
        let game = Game::new("alice".to_string(), &request);
        let host = GamePlayer::new(game.id, "alice".to_string());

        let created = store.create_game(game, host).await.unwrap();
        assert_eq!(created.match_number, 1);
        assert!(store.get_game(created.id).await.unwrap().is_some());
    }
}
