//! Queue Tester CLI Tool
//!
//! Command-line tool for exercising the matchmaking lifecycle against the
//! in-memory stack. Events that would go to AMQP are printed to stdout, so
//! the full queue -> lobby -> map selection -> live -> completed flow can be
//! inspected without a broker.
//!
//! Usage:
//!   cargo run --bin queue-tester -- --help
//!   cargo run --bin queue-tester run-scenario --scenario duel
//!   cargo run --bin queue-tester veto --mode wingman
//!   cargo run --bin queue-tester sweep
//!   cargo run --bin queue-tester run-all-scenarios

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use pug_room::amqp::publisher::EventPublisher;
use pug_room::lifecycle::{CompletionOutcome, JoinOutcome, LifecycleController};
use pug_room::maps::{MapCatalog, MapSelectionCoordinator, SelectionProgress, StaticMapCatalog};
use pug_room::metrics::MetricsCollector;
use pug_room::rating::EloRatingEngine;
use pug_room::store::{GameStore, MemoryGameStore, StatusChange};
use pug_room::sweep::CleanupSweep;
use pug_room::types::{
    CreateQueueRequest, GameCancelled, GameCompleted, GameMode, GameStatus, LobbyFormed,
    MapSelected, MapSelectionMode, PlayerJoined, PlayerLeft, QueueOpened,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "queue-tester")]
#[command(about = "Lifecycle testing tool for pug-room, driven against the in-memory store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Reveal window for map selection animations, in milliseconds
    #[arg(long, default_value = "50")]
    reveal_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a predefined lifecycle scenario end to end
    RunScenario {
        /// Scenario name (duel, wingman, competitive, host-pick)
        #[arg(short, long)]
        scenario: String,
    },
    /// Run all lifecycle scenarios
    RunAllScenarios,
    /// Walk an all-pick map selection round with split votes
    Veto {
        /// Game mode (duel, wingman, competitive)
        #[arg(short, long, default_value = "wingman")]
        mode: String,
    },
    /// Demonstrate the cleanup sweep over stale queues and overdue acceptances
    Sweep,
    /// Show the configured game modes and their map pools
    Modes,
    /// Run a couple of lifecycles and show store statistics
    Stats,
}

/// Event publisher that prints every lifecycle event to stdout
struct ConsolePublisher;

#[async_trait]
impl EventPublisher for ConsolePublisher {
    async fn publish_queue_opened(&self, event: QueueOpened) -> pug_room::Result<()> {
        println!(
            "  📣 QueueOpened:   match #{} by '{}' ({}, {}, {} slots)",
            event.match_number, event.host_id, event.mode, event.selection_mode, event.max_players
        );
        Ok(())
    }

    async fn publish_player_joined(&self, event: PlayerJoined) -> pug_room::Result<()> {
        println!(
            "  📣 PlayerJoined:  '{}' ({}/{})",
            event.player_id, event.current_players, event.max_players
        );
        Ok(())
    }

    async fn publish_player_left(&self, event: PlayerLeft) -> pug_room::Result<()> {
        println!(
            "  📣 PlayerLeft:    '{}' ({} remain)",
            event.player_id, event.current_players
        );
        Ok(())
    }

    async fn publish_lobby_formed(&self, event: LobbyFormed) -> pug_room::Result<()> {
        let teams: Vec<String> = event
            .teams
            .iter()
            .map(|t| format!("{} (avg {})", t.name, t.average_rating))
            .collect();
        println!(
            "  📣 LobbyFormed:   match #{} teams: {:?} map: {:?}",
            event.match_number, teams, event.selected_map
        );
        Ok(())
    }

    async fn publish_map_selected(&self, event: MapSelected) -> pug_room::Result<()> {
        println!(
            "  📣 MapSelected:   '{}' (reveal {}ms)",
            event.map_id, event.reveal_duration_ms
        );
        Ok(())
    }

    async fn publish_game_completed(&self, event: GameCompleted) -> pug_room::Result<()> {
        println!(
            "  📣 GameCompleted: match #{} score {}-{}",
            event.match_number, event.team1_score, event.team2_score
        );
        for change in &event.rating_changes {
            println!(
                "       rating '{}': {} -> {} ({:+})",
                change.player_id, change.old_rating, change.new_rating, change.delta
            );
        }
        Ok(())
    }

    async fn publish_game_cancelled(&self, event: GameCancelled) -> pug_room::Result<()> {
        println!(
            "  📣 GameCancelled: game {} (reason: {:?})",
            event.game_id, event.reason
        );
        Ok(())
    }
}

/// Build the full in-memory lifecycle stack
fn build_stack(
    reveal_ms: u64,
) -> Result<(
    Arc<LifecycleController>,
    Arc<dyn GameStore>,
    Arc<MetricsCollector>,
)> {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let rating_engine = Arc::new(EloRatingEngine::with_defaults());
    let catalog = Arc::new(StaticMapCatalog::new());
    let coordinator = Arc::new(MapSelectionCoordinator::new(
        store.clone(),
        catalog,
        Duration::from_millis(reveal_ms),
    ));
    let publisher = Arc::new(ConsolePublisher);
    let metrics = Arc::new(MetricsCollector::new()?);

    let controller = Arc::new(LifecycleController::with_metrics(
        store.clone(),
        rating_engine,
        coordinator,
        publisher,
        metrics.clone(),
    ));

    Ok((controller, store, metrics))
}

fn parse_game_mode(mode: &str) -> Result<GameMode> {
    match mode.to_lowercase().as_str() {
        "duel" => Ok(GameMode::Duel),
        "wingman" => Ok(GameMode::Wingman),
        "competitive" => Ok(GameMode::Competitive),
        _ => Err(anyhow::anyhow!(
            "Invalid game mode. Use 'duel', 'wingman', or 'competitive'"
        )),
    }
}

fn roster(mode: GameMode, prefix: &str) -> Vec<String> {
    (1..=mode.capacity())
        .map(|i| format!("{}_{}", prefix, i))
        .collect()
}

/// Drive one game from queue creation through accepted results
async fn run_lifecycle(
    controller: &LifecycleController,
    mode: GameMode,
    selection_mode: MapSelectionMode,
    ranked: bool,
) -> Result<()> {
    let players = roster(mode, "player");
    let host = &players[0];

    println!("▶ Creating {} queue hosted by '{}'...", mode, host);
    let game = controller
        .create_queue(CreateQueueRequest {
            host_id: host.clone(),
            mode,
            selection_mode,
            server: None,
            password: None,
            ranked,
            scheduled_start: None,
        })
        .await?;

    println!("▶ Joining {} more players...", players.len() - 1);
    let mut lobby_formed = players.len() == 1;
    for player in &players[1..] {
        match controller.join_queue(game.id, player, None).await? {
            JoinOutcome::Queued { game } => {
                println!("   '{}' queued for match #{}", player, game.match_number);
            }
            JoinOutcome::LobbyFormed { snapshot } => {
                println!(
                    "   '{}' filled the queue; lobby formed with {} players",
                    player,
                    snapshot.players.len()
                );
                lobby_formed = true;
            }
        }
    }
    if !lobby_formed {
        anyhow::bail!("queue did not fill; lobby never formed");
    }

    match selection_mode {
        MapSelectionMode::HostPick => {
            let catalog = StaticMapCatalog::new();
            let map = catalog.eligible_maps(mode)?[0].clone();
            println!("▶ Host picks '{}'...", map);
            controller.select_map(game.id, host, &map).await?;
        }
        MapSelectionMode::AllPick => {
            let catalog = StaticMapCatalog::new();
            let pool = catalog.eligible_maps(mode)?;
            println!("▶ All players pick maps...");
            for (i, player) in players.iter().enumerate() {
                let pick = &pool[i % pool.len()];
                match controller.select_map(game.id, player, pick).await? {
                    SelectionProgress::Pending {
                        players_with_selections,
                        total_players,
                    } => {
                        println!(
                            "   '{}' picked '{}' ({}/{})",
                            player, pick, players_with_selections, total_players
                        );
                    }
                    SelectionProgress::Resolved { game, .. } => {
                        println!(
                            "   '{}' picked '{}'; selection resolved to {:?}",
                            player, pick, game.selected_map
                        );
                    }
                }
            }
        }
        MapSelectionMode::RandomMap => {
            println!("▶ Map was rolled at lobby formation");
        }
    }

    println!("▶ Allocator assigns server...");
    match controller.assign_server(game.id, "192.0.2.10:27015").await? {
        StatusChange::Applied(game) => {
            println!("   match #{} is live on {:?}", game.match_number, game.server);
        }
        StatusChange::Skipped(game) => {
            anyhow::bail!("server assignment skipped; game was {}", game.status);
        }
    }

    println!("▶ Match stats report final score 16-12...");
    match controller.complete_game(game.id, 16, 12).await? {
        CompletionOutcome::Completed { rating_outcome, .. } => match rating_outcome {
            Some(outcome) => {
                println!(
                    "   completed; winners averaged {}, losers {}",
                    outcome.winning_team_average, outcome.losing_team_average
                );
            }
            None => println!("   completed; no ratings moved (unranked or draw)"),
        },
        CompletionOutcome::AlreadyCompleted { .. } => {
            anyhow::bail!("game was already completed");
        }
    }

    println!("▶ Players accept the result...");
    for player in &players {
        controller.accept_match_result(game.id, player).await?;
    }
    for player in &players {
        if controller.current_game(player).await?.is_some() {
            anyhow::bail!("'{}' is still bound to the game after accepting", player);
        }
    }
    println!("   all players accepted and are free to queue again");

    Ok(())
}

/// Walk an all-pick round where votes are split across the pool
async fn run_veto(controller: &LifecycleController, mode: GameMode) -> Result<()> {
    let players = roster(mode, "voter");
    let host = &players[0];

    let game = controller
        .create_queue(CreateQueueRequest {
            host_id: host.clone(),
            mode,
            selection_mode: MapSelectionMode::AllPick,
            server: None,
            password: None,
            ranked: false,
            scheduled_start: None,
        })
        .await?;

    for player in &players[1..] {
        controller.join_queue(game.id, player, None).await?;
    }

    let catalog = StaticMapCatalog::new();
    let pool = catalog.eligible_maps(mode)?;
    println!("Pool for {}: {:?}", mode, pool);
    println!("Each player votes for a different map:");

    for (i, player) in players.iter().enumerate() {
        let pick = &pool[i % pool.len()];
        match controller.select_map(game.id, player, pick).await? {
            SelectionProgress::Pending {
                players_with_selections,
                total_players,
            } => {
                println!(
                    "  '{}' -> '{}' ({}/{} votes in)",
                    player, pick, players_with_selections, total_players
                );
            }
            SelectionProgress::Resolved { game, .. } => {
                println!(
                    "  '{}' -> '{}'; final vote resolved the selection",
                    player, pick
                );
                println!("Selected map: {:?}", game.selected_map);
                println!(
                    "Reveal animation starts at epoch ms {:?}",
                    game.map_anim_select_start_time
                );
            }
        }
    }

    Ok(())
}

/// Demonstrate the cleanup sweep on a stale queue and an overdue acceptance
async fn run_sweep_demo(reveal_ms: u64) -> Result<()> {
    let (controller, store, metrics) = build_stack(reveal_ms)?;
    let sweep = CleanupSweep::new(
        store.clone(),
        controller.clone(),
        metrics,
        Duration::ZERO,
        Duration::ZERO,
    );

    println!("▶ Opening a queue that nobody joins...");
    let stale = controller
        .create_queue(CreateQueueRequest {
            host_id: "idle_host".to_string(),
            mode: GameMode::Competitive,
            selection_mode: MapSelectionMode::AllPick,
            server: None,
            password: None,
            ranked: true,
            scheduled_start: None,
        })
        .await?;

    println!("▶ Playing a duel to completion without anyone accepting...");
    run_lifecycle_unaccepted(&controller).await?;

    println!("▶ Running the cleanup sweep (zero thresholds for the demo)...");
    let report = sweep.run_once().await?;
    println!(
        "Sweep report: {} stale queue(s) cancelled, {} acceptance(s) expired",
        report.queues_cancelled, report.acceptances_expired
    );

    let after = store
        .get_game(stale.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("stale queue disappeared from the store"))?;
    println!("Stale queue is now: {}", after.status);
    if after.status != GameStatus::Cancelled {
        anyhow::bail!("sweep left the stale queue in {}", after.status);
    }

    Ok(())
}

/// Play a duel through completion but skip the acceptance step
async fn run_lifecycle_unaccepted(controller: &LifecycleController) -> Result<()> {
    let game = controller
        .create_queue(CreateQueueRequest {
            host_id: "slowpoke_1".to_string(),
            mode: GameMode::Duel,
            selection_mode: MapSelectionMode::RandomMap,
            server: None,
            password: None,
            ranked: false,
            scheduled_start: None,
        })
        .await?;
    controller.join_queue(game.id, "slowpoke_2", None).await?;
    controller.assign_server(game.id, "192.0.2.11:27015").await?;
    controller.complete_game(game.id, 16, 14).await?;
    Ok(())
}

fn show_modes() -> Result<()> {
    let catalog = StaticMapCatalog::new();
    println!("Configured game modes:");
    for mode in [GameMode::Duel, GameMode::Wingman, GameMode::Competitive] {
        let pool = catalog.eligible_maps(mode)?;
        println!(
            "  {:12} {:2} players, {} map(s): {:?}",
            mode.to_string(),
            mode.capacity(),
            pool.len(),
            pool
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario { scenario } => {
            let (controller, _, _) = build_stack(cli.reveal_ms)?;
            let (mode, selection) = match scenario.to_lowercase().as_str() {
                "duel" => (GameMode::Duel, MapSelectionMode::AllPick),
                "wingman" => (GameMode::Wingman, MapSelectionMode::AllPick),
                "competitive" => (GameMode::Competitive, MapSelectionMode::AllPick),
                "host-pick" => (GameMode::Wingman, MapSelectionMode::HostPick),
                _ => {
                    eprintln!(
                        "❌ Unknown scenario '{}'. Available: duel, wingman, competitive, host-pick",
                        scenario
                    );
                    std::process::exit(1);
                }
            };

            println!("🧪 Running scenario: {}\n", scenario);
            match run_lifecycle(&controller, mode, selection, true).await {
                Ok(()) => println!("\n✅ Scenario completed successfully!"),
                Err(e) => {
                    eprintln!("\n❌ Scenario failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::RunAllScenarios => {
            let scenarios = [
                ("duel", GameMode::Duel, MapSelectionMode::AllPick),
                ("wingman", GameMode::Wingman, MapSelectionMode::AllPick),
                (
                    "competitive",
                    GameMode::Competitive,
                    MapSelectionMode::AllPick,
                ),
                ("host-pick", GameMode::Wingman, MapSelectionMode::HostPick),
            ];

            let mut passed = 0;
            let mut failed = 0;

            println!("🧪 Running all lifecycle scenarios...\n");

            for (name, mode, selection) in scenarios {
                // Fresh stack per scenario so runs cannot interfere
                let (controller, _, _) = build_stack(cli.reveal_ms)?;
                println!("--- Scenario '{}' ---", name);
                match run_lifecycle(&controller, mode, selection, true).await {
                    Ok(()) => {
                        println!("✅ PASSED\n");
                        passed += 1;
                    }
                    Err(e) => {
                        println!("❌ FAILED ({})\n", e);
                        failed += 1;
                    }
                }
            }

            println!("📊 Results: {} passed, {} failed", passed, failed);
            if failed > 0 {
                std::process::exit(1);
            }
        }

        Commands::Veto { mode } => {
            let (controller, _, _) = build_stack(cli.reveal_ms)?;
            let mode = parse_game_mode(&mode)?;
            run_veto(&controller, mode).await?;
        }

        Commands::Sweep => {
            run_sweep_demo(cli.reveal_ms).await?;
            println!("\n✅ Sweep demo completed");
        }

        Commands::Modes => {
            show_modes()?;
        }

        Commands::Stats => {
            let (controller, store, _) = build_stack(cli.reveal_ms)?;

            println!("🧪 Playing a duel and a wingman match...\n");
            run_lifecycle(&controller, GameMode::Duel, MapSelectionMode::AllPick, true).await?;
            println!();
            run_lifecycle(
                &controller,
                GameMode::Wingman,
                MapSelectionMode::AllPick,
                true,
            )
            .await?;

            let stats = store.stats().await?;
            println!("\n📊 Store Statistics:");
            println!("  Open queues: {}", stats.queued_games);
            println!("  Active lobbies: {}", stats.lobby_games);
            println!("  Games in progress: {}", stats.in_progress_games);
            println!("  Games completed: {}", stats.completed_games);
            println!("  Games cancelled: {}", stats.cancelled_games);
            println!("  Players bound to games: {}", stats.players_in_games);
            println!("  Rated players: {}", stats.rated_players);
            println!("  History events: {}", stats.history_events);
        }
    }

    Ok(())
}
