//! Load tests for concurrent queue operations
//!
//! These validate that the store's critical sections hold up when many
//! clients race the same queue: overfilled joins, duplicate result reports,
//! and sustained create/complete cycles.

use std::sync::Arc;
use std::time::Instant;

use pug_room::error::GameError;
use pug_room::lifecycle::{CompletionOutcome, JoinOutcome};
use pug_room::types::{GameMode, GameStatus, MapSelectionMode};

use crate::fixtures::{create_test_system, fill_queue, play_through, queue_request, roster};

#[tokio::test]
async fn test_join_race_fills_exactly_once() {
    let (controller, store, event_publisher) = create_test_system();

    let game = controller
        .create_queue(queue_request(
            "race_host",
            GameMode::Competitive,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap();

    // 30 players race for the 9 open slots
    let mut handles = Vec::new();
    for i in 0..30 {
        let controller = Arc::clone(&controller);
        let game_id = game.id;
        handles.push(tokio::spawn(async move {
            controller
                .join_queue(game_id, &format!("racer_{}", i), None)
                .await
        }));
    }

    let mut queued = 0;
    let mut formed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(JoinOutcome::Queued { .. }) => queued += 1,
            Ok(JoinOutcome::LobbyFormed { .. }) => formed += 1,
            Err(e) => {
                assert!(
                    matches!(
                        e.downcast_ref::<GameError>(),
                        Some(GameError::QueueFull { .. })
                    ),
                    "unexpected join failure: {}",
                    e
                );
                rejected += 1;
            }
        }
    }

    // Exactly one join observed the fill and promoted the lobby
    assert_eq!(formed, 1);
    assert_eq!(queued, 8);
    assert_eq!(rejected, 21);
    assert_eq!(event_publisher.count_events_of_type("LobbyFormed"), 1);

    let final_game = store.get_game(game.id).await.unwrap().unwrap();
    assert_eq!(final_game.status, GameStatus::Lobby);
    assert_eq!(final_game.current_players, 10);

    let snapshot = store.get_snapshot(game.id).await.unwrap().unwrap();
    assert_eq!(snapshot.players.len(), 10);
    assert_eq!(snapshot.teams.len(), 2);
}

#[tokio::test]
async fn test_concurrent_queue_creation() {
    let (controller, store, _event_publisher) = create_test_system();

    let mut handles = Vec::new();
    for i in 0..50 {
        let controller = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            controller
                .create_queue(queue_request(
                    &format!("creator_{}", i),
                    GameMode::Duel,
                    MapSelectionMode::AllPick,
                    true,
                ))
                .await
        }));
    }

    let mut match_numbers = Vec::new();
    for handle in handles {
        let game = handle.await.unwrap().unwrap();
        match_numbers.push(game.match_number);
    }

    // Every creation succeeded with a distinct match number
    match_numbers.sort_unstable();
    match_numbers.dedup();
    assert_eq!(match_numbers.len(), 50);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.queued_games, 50);
    assert_eq!(stats.players_in_games, 50);
}

#[tokio::test]
async fn test_concurrent_result_reports_settle_once() {
    let (controller, store, event_publisher) = create_test_system();
    let players = roster("flood", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::RandomMap,
        true,
    )
    .await;
    let game_id = snapshot.game.id;
    controller
        .assign_server(game_id, "192.0.2.1:27015")
        .await
        .unwrap();

    // A flaky game server redelivers the same report many times
    let mut handles = Vec::new();
    for _ in 0..20 {
        let controller = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            controller.complete_game(game_id, 16, 9).await
        }));
    }

    let mut completed = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            CompletionOutcome::Completed { .. } => completed += 1,
            CompletionOutcome::AlreadyCompleted { .. } => duplicates += 1,
        }
    }
    assert_eq!(completed, 1);
    assert_eq!(duplicates, 19);

    // Ratings settled exactly once
    let winner = snapshot
        .players
        .iter()
        .find(|p| p.team == Some(1))
        .unwrap();
    let loser = snapshot
        .players
        .iter()
        .find(|p| p.team == Some(2))
        .unwrap();
    assert_eq!(store.get_rating(&winner.player_id).await.unwrap(), 1016);
    assert_eq!(store.get_rating(&loser.player_id).await.unwrap(), 984);
    assert_eq!(event_publisher.count_events_of_type("GameCompleted"), 1);
}

#[tokio::test]
async fn test_sustained_lifecycle_throughput() {
    let (controller, store, _event_publisher) = create_test_system();

    const CYCLES: usize = 25;
    let start = Instant::now();

    let mut handles = Vec::new();
    for cycle in 0..CYCLES {
        let controller = Arc::clone(&controller);
        handles.push(tokio::spawn(async move {
            let players = vec![
                format!("cycle{}_a", cycle),
                format!("cycle{}_b", cycle),
            ];
            let snapshot = fill_queue(
                &controller,
                &players,
                GameMode::Duel,
                MapSelectionMode::AllPick,
                true,
            )
            .await;
            play_through(&controller, &snapshot, &players, 16, 9).await;
            for player in &players {
                controller
                    .accept_match_result(snapshot.game.id, player)
                    .await
                    .unwrap();
            }
        }));
    }

    let results = futures::future::join_all(handles).await;
    for result in results {
        result.unwrap();
    }

    let elapsed = start.elapsed();
    let per_second = CYCLES as f64 / elapsed.as_secs_f64();
    println!(
        "Completed {} full lifecycles in {:?} ({:.0} games/sec)",
        CYCLES, elapsed, per_second
    );

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.completed_games, CYCLES);
    assert_eq!(stats.queued_games, 0);
    assert_eq!(stats.in_progress_games, 0);
    assert_eq!(stats.rated_players, CYCLES * 2);
}
