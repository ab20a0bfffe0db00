//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the pug-room lifecycle
//! service: game and player counters driven by the lifecycle controller,
//! store-derived gauges, and AMQP/performance instrumentation.

use crate::store::StoreStats;
use crate::types::{GameMode, MapSelectionMode};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the lifecycle service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Game lifecycle metrics
    game_metrics: GameMetrics,

    /// Player-related metrics
    player_metrics: PlayerMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Total AMQP messages processed
    pub amqp_messages_total: IntCounterVec,

    /// AMQP message processing errors
    pub amqp_errors_total: IntCounterVec,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Game lifecycle metrics
#[derive(Clone)]
pub struct GameMetrics {
    /// Number of games by current status
    pub active_games: IntGaugeVec,

    /// Total queues opened
    pub queues_created_total: IntCounterVec,

    /// Total queues that filled and became lobbies
    pub lobbies_formed_total: IntCounterVec,

    /// Total games completed, by outcome
    pub games_completed_total: IntCounterVec,

    /// Total games cancelled, by reason
    pub games_cancelled_total: IntCounterVec,

    /// Total map selections resolved, by selection mode
    pub maps_selected_total: IntCounterVec,

    /// Total results force-accepted by the grace sweep
    pub acceptances_expired_total: IntCounter,

    /// History events recorded by the store
    pub history_events: IntGauge,

    /// Time from queue creation to lobby formation
    pub queue_fill_time_seconds: HistogramVec,
}

/// Player-related metrics
#[derive(Clone)]
pub struct PlayerMetrics {
    /// Total queue joins
    pub players_joined_total: IntCounter,

    /// Total queue leaves
    pub players_left_total: IntCounter,

    /// Players currently attached to any game
    pub players_in_games: IntGauge,

    /// Players with a stored rating
    pub rated_players: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Rating calculation time
    pub rating_calculation_duration: Histogram,

    /// Sweep pass duration
    pub sweep_duration_seconds: Histogram,

    /// Total sweep passes
    pub sweep_runs_total: IntCounter,

    /// AMQP operation durations
    pub amqp_operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let game_metrics = GameMetrics::new(&registry)?;
        let player_metrics = PlayerMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            game_metrics,
            player_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get game metrics
    pub fn game(&self) -> &GameMetrics {
        &self.game_metrics
    }

    /// Get player metrics
    pub fn player(&self) -> &PlayerMetrics {
        &self.player_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Refresh the absolute gauges from store counters
    pub fn update_from_store_stats(&self, stats: &StoreStats) {
        self.game_metrics
            .active_games
            .with_label_values(&["queue"])
            .set(stats.queued_games as i64);
        self.game_metrics
            .active_games
            .with_label_values(&["lobby"])
            .set(stats.lobby_games as i64);
        self.game_metrics
            .active_games
            .with_label_values(&["in_progress"])
            .set(stats.in_progress_games as i64);
        self.game_metrics
            .active_games
            .with_label_values(&["completed"])
            .set(stats.completed_games as i64);
        self.game_metrics
            .active_games
            .with_label_values(&["cancelled"])
            .set(stats.cancelled_games as i64);

        self.game_metrics
            .history_events
            .set(stats.history_events as i64);

        self.player_metrics
            .players_in_games
            .set(stats.players_in_games as i64);
        self.player_metrics
            .rated_players
            .set(stats.rated_players as i64);
    }

    /// Record a queue being opened
    pub fn record_queue_created(&self, mode: GameMode) {
        self.game_metrics
            .queues_created_total
            .with_label_values(&[mode_label(mode)])
            .inc();
    }

    /// Record a player joining a queue
    pub fn record_player_joined(&self) {
        self.player_metrics.players_joined_total.inc();
    }

    /// Record a player leaving a queue or lobby
    pub fn record_player_left(&self) {
        self.player_metrics.players_left_total.inc();
    }

    /// Record a queue filling into a lobby
    pub fn record_lobby_formed(&self, mode: GameMode, fill_time: Duration) {
        self.game_metrics
            .lobbies_formed_total
            .with_label_values(&[mode_label(mode)])
            .inc();

        self.game_metrics
            .queue_fill_time_seconds
            .with_label_values(&[mode_label(mode)])
            .observe(fill_time.as_secs_f64());
    }

    /// Record a resolved map selection
    pub fn record_map_selected(&self, selection_mode: MapSelectionMode) {
        let mode_str = match selection_mode {
            MapSelectionMode::AllPick => "all_pick",
            MapSelectionMode::HostPick => "host_pick",
            MapSelectionMode::RandomMap => "random_map",
        };

        self.game_metrics
            .maps_selected_total
            .with_label_values(&[mode_str])
            .inc();
    }

    /// Record a completed game
    pub fn record_game_completed(&self, tie: bool) {
        let outcome = if tie { "tie" } else { "decisive" };

        self.game_metrics
            .games_completed_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Record a cancelled game
    pub fn record_game_cancelled(&self, reason: &str) {
        self.game_metrics
            .games_cancelled_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record rating calculation duration
    pub fn record_rating_calculation(&self, duration: Duration) {
        self.performance_metrics
            .rating_calculation_duration
            .observe(duration.as_secs_f64());
    }

    /// Record one sweep pass
    pub fn record_sweep_run(&self, duration: Duration, acceptances_expired: u64) {
        self.performance_metrics.sweep_runs_total.inc();
        self.performance_metrics
            .sweep_duration_seconds
            .observe(duration.as_secs_f64());
        self.game_metrics
            .acceptances_expired_total
            .inc_by(acceptances_expired);
    }

    /// Record AMQP operation
    pub fn record_amqp_operation(&self, operation: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.service_metrics
            .amqp_messages_total
            .with_label_values(&[operation, status])
            .inc();

        if !success {
            self.service_metrics
                .amqp_errors_total
                .with_label_values(&[operation])
                .inc();
        }

        self.performance_metrics
            .amqp_operation_duration
            .with_label_values(&[operation, status])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

fn mode_label(mode: GameMode) -> &'static str {
    match mode {
        GameMode::Duel => "duel",
        GameMode::Wingman => "wingman",
        GameMode::Competitive => "competitive",
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("pug_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let amqp_messages_total = IntCounterVec::new(
            Opts::new(
                "pug_room_amqp_messages_total",
                "Total AMQP messages processed",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_messages_total.clone()))?;

        let amqp_errors_total = IntCounterVec::new(
            Opts::new("pug_room_amqp_errors_total", "Total AMQP errors"),
            &["operation"],
        )?;
        registry.register(Box::new(amqp_errors_total.clone()))?;

        let health_status = IntGauge::new(
            "pug_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("pug_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            amqp_messages_total,
            amqp_errors_total,
            health_status,
            component_health,
        })
    }
}

impl GameMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_games = IntGaugeVec::new(
            Opts::new("pug_room_active_games", "Number of games by status"),
            &["status"],
        )?;
        registry.register(Box::new(active_games.clone()))?;

        let queues_created_total = IntCounterVec::new(
            Opts::new("pug_room_queues_created_total", "Total queues opened"),
            &["mode"],
        )?;
        registry.register(Box::new(queues_created_total.clone()))?;

        let lobbies_formed_total = IntCounterVec::new(
            Opts::new(
                "pug_room_lobbies_formed_total",
                "Total queues that filled into lobbies",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(lobbies_formed_total.clone()))?;

        let games_completed_total = IntCounterVec::new(
            Opts::new("pug_room_games_completed_total", "Total games completed"),
            &["outcome"],
        )?;
        registry.register(Box::new(games_completed_total.clone()))?;

        let games_cancelled_total = IntCounterVec::new(
            Opts::new("pug_room_games_cancelled_total", "Total games cancelled"),
            &["reason"],
        )?;
        registry.register(Box::new(games_cancelled_total.clone()))?;

        let maps_selected_total = IntCounterVec::new(
            Opts::new(
                "pug_room_maps_selected_total",
                "Total map selections resolved",
            ),
            &["selection_mode"],
        )?;
        registry.register(Box::new(maps_selected_total.clone()))?;

        let acceptances_expired_total = IntCounter::new(
            "pug_room_acceptances_expired_total",
            "Total results force-accepted by the grace sweep",
        )?;
        registry.register(Box::new(acceptances_expired_total.clone()))?;

        let history_events = IntGauge::new(
            "pug_room_history_events",
            "History events recorded by the store",
        )?;
        registry.register(Box::new(history_events.clone()))?;

        let queue_fill_time_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pug_room_queue_fill_time_seconds",
                "Time from queue creation to lobby formation",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
            &["mode"],
        )?;
        registry.register(Box::new(queue_fill_time_seconds.clone()))?;

        Ok(Self {
            active_games,
            queues_created_total,
            lobbies_formed_total,
            games_completed_total,
            games_cancelled_total,
            maps_selected_total,
            acceptances_expired_total,
            history_events,
            queue_fill_time_seconds,
        })
    }
}

impl PlayerMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_joined_total =
            IntCounter::new("pug_room_players_joined_total", "Total queue joins")?;
        registry.register(Box::new(players_joined_total.clone()))?;

        let players_left_total =
            IntCounter::new("pug_room_players_left_total", "Total queue leaves")?;
        registry.register(Box::new(players_left_total.clone()))?;

        let players_in_games = IntGauge::new(
            "pug_room_players_in_games",
            "Players currently attached to any game",
        )?;
        registry.register(Box::new(players_in_games.clone()))?;

        let rated_players =
            IntGauge::new("pug_room_rated_players", "Players with a stored rating")?;
        registry.register(Box::new(rated_players.clone()))?;

        Ok(Self {
            players_joined_total,
            players_left_total,
            players_in_games,
            rated_players,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let rating_calculation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pug_room_rating_calculation_duration_seconds",
                "Rating calculation time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
        )?;
        registry.register(Box::new(rating_calculation_duration.clone()))?;

        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("pug_room_sweep_duration_seconds", "Sweep pass duration")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        let sweep_runs_total =
            IntCounter::new("pug_room_sweep_runs_total", "Total sweep passes")?;
        registry.register(Box::new(sweep_runs_total.clone()))?;

        let amqp_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "pug_room_amqp_operation_duration_seconds",
                "AMQP operation duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation", "status"],
        )?;
        registry.register(Box::new(amqp_operation_duration.clone()))?;

        Ok(Self {
            rating_calculation_duration,
            sweep_duration_seconds,
            sweep_runs_total,
            amqp_operation_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        // Test that we can access all metric groups
        let _service = collector.service();
        let _game = collector.game();
        let _player = collector.player();
        let _performance = collector.performance();
    }

    #[test]
    fn test_lifecycle_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_queue_created(GameMode::Duel);
        collector.record_player_joined();
        collector.record_lobby_formed(GameMode::Duel, Duration::from_secs(12));
        collector.record_map_selected(MapSelectionMode::AllPick);
        collector.record_game_completed(false);
        collector.record_game_cancelled("timeout");
        collector.record_rating_calculation(Duration::from_nanos(1000));

        assert_eq!(collector.player().players_joined_total.get(), 1);
        assert_eq!(
            collector
                .game()
                .games_cancelled_total
                .with_label_values(&["timeout"])
                .get(),
            1
        );
    }

    #[test]
    fn test_store_stats_update() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let stats = StoreStats {
            queued_games: 3,
            lobby_games: 1,
            in_progress_games: 2,
            completed_games: 5,
            cancelled_games: 4,
            players_in_games: 17,
            rated_players: 40,
            history_events: 120,
        };
        collector.update_from_store_stats(&stats);

        assert_eq!(
            collector
                .game()
                .active_games
                .with_label_values(&["queue"])
                .get(),
            3
        );
        assert_eq!(collector.player().players_in_games.get(), 17);
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_health_status(2); // Healthy
        collector.update_component_health("store", true);
        collector.update_component_health("amqp", false);
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();

        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
