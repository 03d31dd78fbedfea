use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::file_store::{FileStore, SweepReport};

/// Shortest period between scheduled sweeps.
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Background task that reclaims expired (and orphaned) files on a fixed cadence.
#[derive(Clone)]
pub struct CleanupService {
    store: Arc<FileStore>,
    cleanup_interval: Duration,
    /// Zero disables the orphan scan.
    orphan_grace_period: Duration,
}

impl CleanupService {
    /// Intervals shorter than [`MIN_CLEANUP_INTERVAL`] (including zero) are raised to it.
    pub fn new(store: Arc<FileStore>) -> Self {
        let retention = *store.retention();
        if retention.cleanup_interval < MIN_CLEANUP_INTERVAL {
            tracing::warn!(
                configured_ms = retention.cleanup_interval.as_millis() as u64,
                "Cleanup interval too short, using the minimum of one second"
            );
        }
        Self {
            store,
            cleanup_interval: retention.cleanup_interval.max(MIN_CLEANUP_INTERVAL),
            orphan_grace_period: retention.orphan_grace_period,
        }
    }

    /// Start the background cleanup task.
    ///
    /// The first sweep runs immediately, then one every `cleanup_interval`. The
    /// task exits once `token` is cancelled; an in-flight sweep stops at the next
    /// record boundary. Returns a JoinHandle for graceful shutdown.
    pub fn start(self: Arc<Self>, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.cleanup_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                interval_secs = self.cleanup_interval.as_secs(),
                "Cleanup routine started"
            );

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                self.run_once(&token).await;
            }

            tracing::info!("Cleanup routine stopped");
        })
    }

    /// One scheduled pass: expired records first, then orphans.
    #[tracing::instrument(skip(self, token), fields(cleanup.operation = "expire_all"))]
    pub async fn run_once(&self, token: &CancellationToken) -> SweepReport {
        tracing::debug!("Starting scheduled cleanup of expired files");

        let report = self.store.cleanup_until(token).await;

        if report.expired > 0 || report.cancelled {
            tracing::info!(
                expired = report.expired,
                removed = report.removed,
                failed = report.failed,
                cancelled = report.cancelled,
                "Cleanup completed"
            );
        }

        if !token.is_cancelled() {
            match self.store.reclaim_orphans(self.orphan_grace_period).await {
                Ok(0) => {}
                Ok(orphans) => tracing::info!(orphans, "Orphan scan completed"),
                Err(e) => tracing::error!(error = %e, "Orphan scan failed"),
            }
        }

        report
    }
}
