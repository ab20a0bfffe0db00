//! Full lifecycle scenarios across every mode and selection protocol
//!
//! These exercise the controller through the same sequence the AMQP and
//! sweep paths drive in production: queue, lobby formation, map selection,
//! server assignment, completion, and result acceptance.

use pug_room::error::GameError;
use pug_room::lifecycle::{CompletionOutcome, JoinOutcome, LeaveOutcome};
use pug_room::maps::{MapCatalog, SelectionProgress, StaticMapCatalog};
use pug_room::store::StatusChange;
use pug_room::types::{GameMode, GameStatus, MapSelectionMode, WireMessage};

use crate::fixtures::{create_test_system, fill_queue, play_through, queue_request, roster};

#[tokio::test]
async fn test_competitive_lifecycle_end_to_end() {
    let (controller, store, event_publisher) = create_test_system();
    let players = roster("comp", GameMode::Competitive);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Competitive,
        MapSelectionMode::AllPick,
        true,
    )
    .await;

    assert_eq!(snapshot.players.len(), 10);
    assert_eq!(snapshot.teams.len(), 2);
    for team in &snapshot.teams {
        let members = snapshot
            .players
            .iter()
            .filter(|p| p.team == Some(team.number))
            .count();
        assert_eq!(members, 5);
    }

    play_through(&controller, &snapshot, &players, 16, 9).await;

    assert_eq!(event_publisher.count_events_of_type("QueueOpened"), 1);
    assert_eq!(event_publisher.count_events_of_type("PlayerJoined"), 9);
    assert_eq!(event_publisher.count_events_of_type("LobbyFormed"), 1);
    assert_eq!(event_publisher.count_events_of_type("MapSelected"), 1);
    assert_eq!(event_publisher.count_events_of_type("GameCompleted"), 1);

    // Team 1 won; every member moved the same amount in an even matchup
    for player in &snapshot.players {
        let rating = store.get_rating(&player.player_id).await.unwrap();
        match player.team {
            Some(1) => assert_eq!(rating, 1016, "winner {} rating", player.player_id),
            Some(2) => assert_eq!(rating, 984, "loser {} rating", player.player_id),
            other => panic!("player {} has no team: {:?}", player.player_id, other),
        }
    }

    let completion = event_publisher.last_completion().unwrap();
    assert_eq!(completion.rating_changes.len(), 10);
}

#[tokio::test]
async fn test_host_pick_requires_host() {
    let (controller, _store, event_publisher) = create_test_system();
    let players = roster("hp", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::HostPick,
        true,
    )
    .await;
    let game_id = snapshot.game.id;

    // The guest's pick carries no weight here
    let err = controller
        .select_map(game_id, &players[1], "aim_map")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GameError>(),
        Some(GameError::NotHost { .. })
    ));

    let progress = controller
        .select_map(game_id, &players[0], "aim_map")
        .await
        .unwrap();
    match progress {
        SelectionProgress::Resolved {
            game,
            newly_resolved,
        } => {
            assert_eq!(game.selected_map.as_deref(), Some("aim_map"));
            assert!(newly_resolved);
        }
        other => panic!("expected resolution, got {:?}", other),
    }
    assert_eq!(event_publisher.count_events_of_type("MapSelected"), 1);
}

#[tokio::test]
async fn test_random_map_resolves_at_formation() {
    let (controller, _store, event_publisher) = create_test_system();
    let players = roster("rm", GameMode::Duel);
    let pool = StaticMapCatalog::new()
        .eligible_maps(GameMode::Duel)
        .unwrap();

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::RandomMap,
        true,
    )
    .await;

    // The map was rolled before anyone could pick
    let selected = snapshot.game.selected_map.clone().unwrap();
    assert!(pool.contains(&selected), "'{}' not in duel pool", selected);
    assert!(snapshot.game.map_selection_complete);
    assert!(snapshot.game.map_anim_select_start_time.is_some());

    // Formation announces both the lobby and the rolled map
    assert_eq!(event_publisher.count_events_of_type("MapSelected"), 1);
    let lobby_event = event_publisher
        .get_published_events()
        .into_iter()
        .find_map(|m| match m {
            WireMessage::LobbyFormed(e) => Some(e),
            _ => None,
        })
        .unwrap();
    assert_eq!(lobby_event.selected_map.as_deref(), Some(selected.as_str()));

    // Any later pick is a re-selection
    let err = controller
        .select_map(snapshot.game.id, &players[0], "aim_map")
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GameError>(),
        Some(GameError::SelectionAlreadyComplete { .. })
    ));
}

#[tokio::test]
async fn test_all_pick_sentinel_takes_concrete_pick() {
    let (controller, store, _event_publisher) = create_test_system();
    let players = roster("ap", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::AllPick,
        true,
    )
    .await;
    let game_id = snapshot.game.id;

    let progress = controller
        .select_map(game_id, &players[0], "awp_lego")
        .await
        .unwrap();
    assert!(matches!(
        progress,
        SelectionProgress::Pending {
            players_with_selections: 1,
            total_players: 2,
        }
    ));

    // The lone concrete pick is the only possible replacement
    let progress = controller
        .select_map(game_id, &players[1], "random")
        .await
        .unwrap();
    match progress {
        SelectionProgress::Resolved { game, .. } => {
            assert_eq!(game.selected_map.as_deref(), Some("awp_lego"));
        }
        other => panic!("expected resolution, got {:?}", other),
    }

    let resolved = store.get_snapshot(game_id).await.unwrap().unwrap();
    for player in &resolved.players {
        assert_eq!(player.map_selection.as_deref(), Some("awp_lego"));
    }
}

#[tokio::test]
async fn test_unranked_game_moves_no_ratings() {
    let (controller, store, event_publisher) = create_test_system();
    let players = roster("unranked", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::HostPick,
        false,
    )
    .await;
    let game_id = snapshot.game.id;

    controller
        .select_map(game_id, &players[0], "aim_map")
        .await
        .unwrap();
    controller
        .assign_server(game_id, "192.0.2.1:27015")
        .await
        .unwrap();

    let outcome = controller.complete_game(game_id, 16, 3).await.unwrap();
    match outcome {
        CompletionOutcome::Completed {
            game,
            rating_outcome,
        } => {
            assert_eq!(game.status, GameStatus::Completed);
            assert!(rating_outcome.is_none());
        }
        other => panic!("expected completion, got {:?}", other),
    }

    for player in &players {
        assert_eq!(store.get_rating(player).await.unwrap(), 1000);
    }
    let completion = event_publisher.last_completion().unwrap();
    assert!(completion.rating_changes.is_empty());
}

#[tokio::test]
async fn test_draw_moves_no_ratings() {
    let (controller, store, _event_publisher) = create_test_system();
    let players = roster("draw", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::AllPick,
        true,
    )
    .await;
    play_through(&controller, &snapshot, &players, 15, 15).await;

    // Ranked but drawn: nobody moves
    for player in &players {
        assert_eq!(store.get_rating(player).await.unwrap(), 1000);
    }
}

#[tokio::test]
async fn test_duplicate_result_reports_are_idempotent() {
    let (controller, store, event_publisher) = create_test_system();
    let players = roster("dup", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::AllPick,
        true,
    )
    .await;
    play_through(&controller, &snapshot, &players, 16, 9).await;

    // A redelivered report must not move ratings again
    let outcome = controller
        .complete_game(snapshot.game.id, 16, 9)
        .await
        .unwrap();
    assert!(matches!(outcome, CompletionOutcome::AlreadyCompleted { .. }));

    let winner = snapshot
        .players
        .iter()
        .find(|p| p.team == Some(1))
        .unwrap();
    assert_eq!(store.get_rating(&winner.player_id).await.unwrap(), 1016);
    assert_eq!(event_publisher.count_events_of_type("GameCompleted"), 1);
}

#[tokio::test]
async fn test_duplicate_server_assignment_skipped() {
    let (controller, store, _event_publisher) = create_test_system();
    let players = roster("srv", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::RandomMap,
        true,
    )
    .await;
    let game_id = snapshot.game.id;

    let change = controller
        .assign_server(game_id, "192.0.2.7:27015")
        .await
        .unwrap();
    match change {
        StatusChange::Applied(game) => {
            assert_eq!(game.status, GameStatus::InProgress);
            assert_eq!(game.server.as_deref(), Some("192.0.2.7:27015"));
        }
        other => panic!("expected applied assignment, got {:?}", other),
    }

    // A redelivered assignment keeps the original server
    let change = controller
        .assign_server(game_id, "192.0.2.99:27015")
        .await
        .unwrap();
    assert!(matches!(change, StatusChange::Skipped(_)));

    let game = store.get_game(game_id).await.unwrap().unwrap();
    assert_eq!(game.server.as_deref(), Some("192.0.2.7:27015"));
    assert_eq!(game.status, GameStatus::InProgress);
}

#[tokio::test]
async fn test_acceptance_releases_players_individually() {
    let (controller, _store, _event_publisher) = create_test_system();
    let players = roster("acc", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::AllPick,
        true,
    )
    .await;
    play_through(&controller, &snapshot, &players, 16, 9).await;
    let game_id = snapshot.game.id;

    // Completed-but-unaccepted still blocks both players
    for player in &players {
        let current = controller.current_game(player).await.unwrap().unwrap();
        assert_eq!(current.game.status, GameStatus::Completed);
    }

    controller
        .accept_match_result(game_id, &players[0])
        .await
        .unwrap();
    assert!(controller.current_game(&players[0]).await.unwrap().is_none());
    assert!(controller.current_game(&players[1]).await.unwrap().is_some());

    controller
        .accept_match_result(game_id, &players[1])
        .await
        .unwrap();
    assert!(controller.current_game(&players[1]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_queue_leave_reopens_slot() {
    let (controller, _store, event_publisher) = create_test_system();

    let game = controller
        .create_queue(queue_request(
            "ql_host",
            GameMode::Wingman,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap();
    for player in ["ql_two", "ql_three"] {
        let outcome = controller.join_queue(game.id, player, None).await.unwrap();
        assert!(matches!(outcome, JoinOutcome::Queued { .. }));
    }

    let outcome = controller.leave_or_disband("ql_two").await.unwrap();
    match outcome {
        LeaveOutcome::Left { game } => assert_eq!(game.current_players, 2),
        other => panic!("expected plain leave, got {:?}", other),
    }
    assert_eq!(event_publisher.count_events_of_type("PlayerLeft"), 1);

    // The freed slot admits two more players and the lobby forms without
    // the leaver
    controller.join_queue(game.id, "ql_four", None).await.unwrap();
    let outcome = controller.join_queue(game.id, "ql_five", None).await.unwrap();
    match outcome {
        JoinOutcome::LobbyFormed { snapshot } => {
            let ids: Vec<&str> = snapshot
                .players
                .iter()
                .map(|p| p.player_id.as_str())
                .collect();
            assert_eq!(ids.len(), 4);
            assert!(!ids.contains(&"ql_two"));
        }
        other => panic!("expected lobby formation, got {:?}", other),
    }

    // The leaver is free to host a new queue
    controller
        .create_queue(queue_request(
            "ql_two",
            GameMode::Duel,
            MapSelectionMode::AllPick,
            true,
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_formed_lobby_rejects_new_joins() {
    let (controller, _store, _event_publisher) = create_test_system();
    let players = roster("closed", GameMode::Duel);

    let snapshot = fill_queue(
        &controller,
        &players,
        GameMode::Duel,
        MapSelectionMode::AllPick,
        true,
    )
    .await;

    let err = controller
        .join_queue(snapshot.game.id, "closed_late", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GameError>(),
        Some(GameError::QueueFull { .. })
    ));
}
