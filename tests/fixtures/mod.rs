//! Test fixtures and shared helpers for integration testing

use async_trait::async_trait;
use pug_room::amqp::publisher::EventPublisher;
use pug_room::error::Result;
use pug_room::lifecycle::{JoinOutcome, LifecycleController};
use pug_room::maps::{MapCatalog, MapSelectionCoordinator, StaticMapCatalog};
use pug_room::rating::EloRatingEngine;
use pug_room::store::{GameStore, MemoryGameStore, StatusChange};
use pug_room::types::{
    CreateQueueRequest, GameCancelled, GameCompleted, GameMode, GameSnapshot, LobbyFormed,
    MapSelected, MapSelectionMode, PlayerJoined, PlayerLeft, QueueOpened, WireMessage,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Event publisher that captures published events for inspection
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published_events: Arc<Mutex<Vec<WireMessage>>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self {
            published_events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<WireMessage> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of a specific type
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| match event {
                WireMessage::QueueOpened(_) => event_type == "QueueOpened",
                WireMessage::PlayerJoined(_) => event_type == "PlayerJoined",
                WireMessage::PlayerLeft(_) => event_type == "PlayerLeft",
                WireMessage::LobbyFormed(_) => event_type == "LobbyFormed",
                WireMessage::MapSelected(_) => event_type == "MapSelected",
                WireMessage::GameCompleted(_) => event_type == "GameCompleted",
                WireMessage::GameCancelled(_) => event_type == "GameCancelled",
                _ => false,
            })
            .count()
    }

    /// The last GameCompleted event, if any was published
    pub fn last_completion(&self) -> Option<GameCompleted> {
        self.get_published_events()
            .into_iter()
            .rev()
            .find_map(|event| match event {
                WireMessage::GameCompleted(completed) => Some(completed),
                _ => None,
            })
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish_queue_opened(&self, event: QueueOpened) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(WireMessage::QueueOpened(event));
        }
        Ok(())
    }

    async fn publish_player_joined(&self, event: PlayerJoined) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(WireMessage::PlayerJoined(event));
        }
        Ok(())
    }

    async fn publish_player_left(&self, event: PlayerLeft) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(WireMessage::PlayerLeft(event));
        }
        Ok(())
    }

    async fn publish_lobby_formed(&self, event: LobbyFormed) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(WireMessage::LobbyFormed(event));
        }
        Ok(())
    }

    async fn publish_map_selected(&self, event: MapSelected) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(WireMessage::MapSelected(event));
        }
        Ok(())
    }

    async fn publish_game_completed(&self, event: GameCompleted) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(WireMessage::GameCompleted(event));
        }
        Ok(())
    }

    async fn publish_game_cancelled(&self, event: GameCancelled) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(WireMessage::GameCancelled(event));
        }
        Ok(())
    }
}

/// Integration test setup that creates a complete in-memory system
pub fn create_test_system() -> (
    Arc<LifecycleController>,
    Arc<dyn GameStore>,
    Arc<RecordingEventPublisher>,
) {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let event_publisher = Arc::new(RecordingEventPublisher::new());
    let rating_engine = Arc::new(EloRatingEngine::with_defaults());
    let catalog = Arc::new(StaticMapCatalog::new());
    let map_coordinator = Arc::new(MapSelectionCoordinator::new(
        store.clone(),
        catalog,
        Duration::from_millis(10),
    ));

    let controller = Arc::new(LifecycleController::new(
        store.clone(),
        rating_engine,
        map_coordinator,
        event_publisher.clone(),
    ));

    (controller, store, event_publisher)
}

/// Build a queue creation request with sensible test defaults
pub fn queue_request(
    host_id: &str,
    mode: GameMode,
    selection_mode: MapSelectionMode,
    ranked: bool,
) -> CreateQueueRequest {
    CreateQueueRequest {
        host_id: host_id.to_string(),
        mode,
        selection_mode,
        server: None,
        password: None,
        ranked,
        scheduled_start: None,
    }
}

/// Player names for a full roster of the given mode
pub fn roster(prefix: &str, mode: GameMode) -> Vec<String> {
    (1..=mode.capacity())
        .map(|i| format!("{}_{}", prefix, i))
        .collect()
}

/// Create a queue for the roster's first player and join the rest until the
/// lobby forms; returns the formed snapshot
pub async fn fill_queue(
    controller: &LifecycleController,
    players: &[String],
    mode: GameMode,
    selection_mode: MapSelectionMode,
    ranked: bool,
) -> GameSnapshot {
    let game = controller
        .create_queue(queue_request(&players[0], mode, selection_mode, ranked))
        .await
        .expect("queue creation should succeed");

    let mut formed = None;
    for player in &players[1..] {
        match controller
            .join_queue(game.id, player, None)
            .await
            .expect("join should succeed")
        {
            JoinOutcome::Queued { .. } => {}
            JoinOutcome::LobbyFormed { snapshot } => formed = Some(snapshot),
        }
    }

    formed.expect("filling the roster should form the lobby")
}

/// Drive a formed lobby through map selection, server assignment, and a
/// final score report
pub async fn play_through(
    controller: &LifecycleController,
    snapshot: &GameSnapshot,
    players: &[String],
    team1_score: u32,
    team2_score: u32,
) {
    let game_id = snapshot.game.id;

    if snapshot.game.selection_mode == MapSelectionMode::AllPick {
        let catalog = StaticMapCatalog::new();
        let pool = catalog
            .eligible_maps(snapshot.game.mode)
            .expect("mode should have a map pool");
        for (i, player) in players.iter().enumerate() {
            controller
                .select_map(game_id, player, &pool[i % pool.len()])
                .await
                .expect("map pick should succeed");
        }
    }

    let change = controller
        .assign_server(game_id, "192.0.2.1:27015")
        .await
        .expect("server assignment should succeed");
    assert!(matches!(change, StatusChange::Applied(_)));

    controller
        .complete_game(game_id, team1_score, team2_score)
        .await
        .expect("result report should succeed");
}
