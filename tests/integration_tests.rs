//! Integration tests for the pug-room lifecycle service
//!
//! These tests validate the entire system working together, including:
//! - Complete game lifecycle workflows
//! - Map selection protocols
//! - Rating movement on completion
//! - Event publishing
//! - Concurrent request handling

// Modules for organizing tests
mod fixtures;

#[path = "integration/game_lifecycle.rs"]
mod game_lifecycle;

#[path = "load/concurrent_joins.rs"]
mod concurrent_joins;

use pug_room::error::GameError;
use pug_room::lifecycle::{JoinOutcome, LeaveOutcome};
use pug_room::types::{CreateQueueRequest, GameMode, GameStatus, MapSelectionMode};

use fixtures::{create_test_system, fill_queue, play_through, queue_request, roster};

#[tokio::test]
async fn test_complete_duel_lifecycle() {
    let (controller, store, event_publisher) = create_test_system();
    let players = roster("duelist", GameMode::Duel);

    // Step 1: Host opens a queue
    let game = controller
        .create_queue(queue_request(
            &players[0],
            GameMode::Duel,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap();
    assert_eq!(game.status, GameStatus::Queue);
    assert_eq!(game.max_players, 2);
    assert_eq!(event_publisher.count_events_of_type("QueueOpened"), 1);

    // Step 2: Opponent joins and fills the queue
    let snapshot = match controller.join_queue(game.id, &players[1], None).await {
        Ok(JoinOutcome::LobbyFormed { snapshot }) => snapshot,
        other => panic!("expected lobby formation, got {:?}", other.map(|_| ())),
    };
    assert_eq!(snapshot.game.status, GameStatus::Lobby);
    assert_eq!(snapshot.players.len(), 2);
    assert_eq!(event_publisher.count_events_of_type("PlayerJoined"), 1);
    assert_eq!(event_publisher.count_events_of_type("LobbyFormed"), 1);

    // Step 3: Both players pick the same map; selection resolves
    play_through(&controller, &snapshot, &players, 16, 9).await;
    assert_eq!(event_publisher.count_events_of_type("MapSelected"), 1);
    assert_eq!(event_publisher.count_events_of_type("GameCompleted"), 1);

    // Step 4: Ratings moved symmetrically for an even matchup
    let winner = store.get_rating(&players[0]).await.unwrap();
    let loser = store.get_rating(&players[1]).await.unwrap();
    assert_eq!(winner, 1016);
    assert_eq!(loser, 984);

    let completion = event_publisher.last_completion().unwrap();
    assert_eq!(completion.team1_score, 16);
    assert_eq!(completion.team2_score, 9);
    assert_eq!(completion.rating_changes.len(), 2);

    // Step 5: Acceptance releases each player
    for player in &players {
        assert!(controller.current_game(player).await.unwrap().is_some());
        controller.accept_match_result(game.id, player).await.unwrap();
        assert!(controller.current_game(player).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_wingman_lobby_splits_into_even_teams() {
    let (controller, _store, _event_publisher) = create_test_system();
    let players = roster("wing", GameMode::Wingman);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Wingman,
        MapSelectionMode::AllPick,
        true,
    )
    .await;

    assert_eq!(snapshot.teams.len(), 2);
    for team in &snapshot.teams {
        let members = snapshot
            .players
            .iter()
            .filter(|p| p.team == Some(team.number))
            .count();
        assert_eq!(members, 2, "team {} should hold half the roster", team.name);
        // Fresh players all carry the base rating
        assert_eq!(team.average_rating, 1000);
    }
}

#[tokio::test]
async fn test_host_disband_cancels_queue() {
    let (controller, store, event_publisher) = create_test_system();

    let game = controller
        .create_queue(queue_request(
            "dis_host",
            GameMode::Wingman,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap();
    controller.join_queue(game.id, "dis_member", None).await.unwrap();

    // Host leaving disbands the whole queue
    let outcome = controller.leave_or_disband("dis_host").await.unwrap();
    assert!(matches!(outcome, LeaveOutcome::Disbanded { .. }));
    assert_eq!(event_publisher.count_events_of_type("GameCancelled"), 1);

    let cancelled = store.get_game(game.id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, GameStatus::Cancelled);

    // Both players are free to queue again
    assert!(controller.current_game("dis_host").await.unwrap().is_none());
    assert!(controller.current_game("dis_member").await.unwrap().is_none());
}

#[tokio::test]
async fn test_password_protected_queue() {
    let (controller, _store, _event_publisher) = create_test_system();

    let game = controller
        .create_queue(CreateQueueRequest {
            host_id: "pw_host".to_string(),
            mode: GameMode::Duel,
            selection_mode: MapSelectionMode::AllPick,
            server: None,
            password: Some("sekrit".to_string()),
            ranked: false,
            scheduled_start: None,
        })
        .await
        .unwrap();

    // Wrong password is rejected
    let err = controller
        .join_queue(game.id, "pw_guest", Some("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GameError>(),
        Some(GameError::BadPassword { .. })
    ));

    // Missing password is rejected too
    let err = controller
        .join_queue(game.id, "pw_guest", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GameError>(),
        Some(GameError::BadPassword { .. })
    ));

    // Correct password fills the duel
    let outcome = controller
        .join_queue(game.id, "pw_guest", Some("sekrit"))
        .await
        .unwrap();
    assert!(matches!(outcome, JoinOutcome::LobbyFormed { .. }));
}

#[tokio::test]
async fn test_busy_player_cannot_queue_twice() {
    let (controller, _store, _event_publisher) = create_test_system();

    let first = controller
        .create_queue(queue_request(
            "busy_one",
            GameMode::Competitive,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap();

    // Hosting a second queue is rejected
    let err = controller
        .create_queue(queue_request(
            "busy_one",
            GameMode::Duel,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GameError>(),
        Some(GameError::AlreadyInGame { .. })
    ));

    // Joining someone else's queue is rejected as well
    let other = controller
        .create_queue(queue_request(
            "busy_two",
            GameMode::Duel,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap();
    let err = controller
        .join_queue(other.id, "busy_one", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GameError>(),
        Some(GameError::AlreadyInGame { .. })
    ));

    // The original queue is untouched
    let queues = controller.active_queues().await.unwrap();
    assert!(queues.iter().any(|g| g.id == first.id));
}

#[tokio::test]
async fn test_error_handling_and_recovery() {
    let (controller, _store, _event_publisher) = create_test_system();

    // Joining a game that does not exist fails cleanly
    let missing = pug_room::utils::generate_game_id();
    let err = controller
        .join_queue(missing, "ghost", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GameError>(),
        Some(GameError::NotFound { .. })
    ));

    // The system still serves valid requests afterwards
    let players = roster("recovery", GameMode::Duel);
    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::AllPick,
        false,
    )
    .await;
    assert_eq!(snapshot.game.status, GameStatus::Lobby);
}

#[tokio::test]
async fn test_store_statistics_track_lifecycle() {
    let (controller, store, _event_publisher) = create_test_system();

    let initial = store.stats().await.unwrap();
    assert_eq!(initial.queued_games, 0);
    assert_eq!(initial.completed_games, 0);

    // One open queue
    controller
        .create_queue(queue_request(
            "stat_idle",
            GameMode::Competitive,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap();

    // One completed duel
    let players = roster("stat_duel", GameMode::Duel);
    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::AllPick,
        true,
    )
    .await;
    play_through(&controller, &snapshot, &players, 16, 7).await;

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.queued_games, 1);
    assert_eq!(stats.completed_games, 1);
    assert_eq!(stats.in_progress_games, 0);
    assert_eq!(stats.rated_players, 2);
    assert!(stats.history_events > 0);
    assert_eq!(stats.total_games(), 2);
}
