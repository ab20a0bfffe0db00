//! Periodic cleanup sweep
//!
//! Two passes on a fixed schedule: queues untouched past the inactivity
//! threshold are cancelled with `timeout` history, and completed games past
//! the acceptance grace have their outstanding result flags forced so the
//! players can queue again.
//!
//! The sweep scans through the store but mutates only through the lifecycle
//! controller, so it resolves races with player actions the same way client
//! calls do: a queue that formed a lobby after the scan commits as a no-op.

use crate::lifecycle::LifecycleController;
use crate::metrics::MetricsCollector;
use crate::store::GameStore;
use crate::types::{Game, GameStatus};
use crate::utils;
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// What one sweep pass did
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepReport {
    /// Inactive queues cancelled this pass
    pub queues_cancelled: usize,
    /// Result acceptance flags forced across all graced games
    pub acceptances_expired: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.queues_cancelled == 0 && self.acceptances_expired == 0
    }
}

/// Periodic reclamation of abandoned queues and overdue acceptances
pub struct CleanupSweep {
    store: Arc<dyn GameStore>,
    controller: Arc<LifecycleController>,
    metrics: Arc<MetricsCollector>,
    queue_inactivity: Duration,
    acceptance_grace: Duration,
}

impl CleanupSweep {
    pub fn new(
        store: Arc<dyn GameStore>,
        controller: Arc<LifecycleController>,
        metrics: Arc<MetricsCollector>,
        queue_inactivity: Duration,
        acceptance_grace: Duration,
    ) -> Self {
        Self {
            store,
            controller,
            metrics,
            queue_inactivity,
            acceptance_grace,
        }
    }

    /// Run one full sweep pass
    ///
    /// A failure on one game is logged and skipped; the pass continues so a
    /// single bad record cannot stall reclamation of the rest.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let timer = Instant::now();
        let mut report = SweepReport::default();

        report.queues_cancelled = self.sweep_inactive_queues().await?;
        report.acceptances_expired = self.sweep_overdue_acceptances().await?;

        self.metrics
            .record_sweep_run(timer.elapsed(), report.acceptances_expired);

        if report.is_empty() {
            debug!("Sweep pass completed - nothing to reclaim");
        } else {
            info!(
                "Sweep pass completed - {} queues cancelled, {} acceptances expired",
                report.queues_cancelled, report.acceptances_expired
            );
        }

        Ok(report)
    }

    /// Cancel every queue whose last update predates the inactivity cutoff
    async fn sweep_inactive_queues(&self) -> Result<usize> {
        let queues = self.store.list_by_status(GameStatus::Queue).await?;
        let cutoff = utils::current_timestamp()
            - chrono::Duration::seconds(self.queue_inactivity.as_secs() as i64);

        let mut cancelled = 0;
        for game in queues.iter().filter(|g| g.updated_at <= cutoff) {
            match self.controller.timeout_queue(game.id).await {
                // false means the queue progressed or closed since the scan
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Sweep failed to time out queue {}: {}", game.id, e);
                }
            }
        }

        Ok(cancelled)
    }

    /// Force outstanding acceptances on completed games past the grace window
    async fn sweep_overdue_acceptances(&self) -> Result<u64> {
        let completed = self.store.list_by_status(GameStatus::Completed).await?;
        let cutoff = utils::current_timestamp()
            - chrono::Duration::seconds(self.acceptance_grace.as_secs() as i64);

        let mut expired = 0u64;
        for game in completed.iter().filter(|g| past_grace(g, cutoff)) {
            match self.controller.expire_result_acceptance(game.id).await {
                Ok(newly_accepted) => expired += newly_accepted as u64,
                Err(e) => {
                    warn!(
                        "Sweep failed to expire acceptances for game {}: {}",
                        game.id, e
                    );
                }
            }
        }

        Ok(expired)
    }

    /// Start the periodic sweep task, gated on the service running flag
    pub fn start_task(
        self: Arc<Self>,
        sweep_interval: Duration,
        is_running: Arc<RwLock<bool>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            info!(
                "Cleanup sweep task started ({}s interval)",
                sweep_interval.as_secs()
            );

            while *is_running.read().await {
                ticker.tick().await;

                if let Err(e) = self.run_once().await {
                    warn!("Sweep pass failed: {}", e);
                }
            }

            info!("Cleanup sweep task stopped");
        })
    }
}

/// Status transitions stamp `updated_at`, so for a completed game it marks
/// the completion time
fn past_grace(game: &Game, cutoff: chrono::DateTime<chrono::Utc>) -> bool {
    game.updated_at <= cutoff
}
