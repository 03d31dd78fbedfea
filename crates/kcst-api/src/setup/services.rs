//! Retention store and background task wiring.

use crate::constants::CLEANUP_SHUTDOWN_TIMEOUT_SECS;
use crate::state::AppState;
use anyhow::{Context, Result};
use kcst_core::Config;
use kcst_services::{CleanupService, FileStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Open the content directory and metadata snapshot and build the shared state.
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let store = FileStore::open(&config.storage, config.retention)
        .await
        .with_context(|| {
            format!(
                "Failed to open file store (upload dir {}, db {})",
                config.storage.upload_dir.display(),
                config.storage.db_path.display()
            )
        })?;

    tracing::info!(
        upload_dir = %config.storage.upload_dir.display(),
        db_path = %config.storage.db_path.display(),
        records = store.record_count().await,
        degraded = store.is_degraded(),
        "File store initialized"
    );

    Ok(Arc::new(AppState::new(Arc::new(store), config.clone())))
}

/// Handles for tasks that must be stopped on shutdown.
pub struct BackgroundTasks {
    token: CancellationToken,
    cleanup: JoinHandle<()>,
}

/// Start the periodic cleanup of expired files.
pub fn start_background_tasks(state: &Arc<AppState>) -> BackgroundTasks {
    let token = CancellationToken::new();
    let cleanup = Arc::new(CleanupService::new(state.store.clone())).start(token.clone());
    BackgroundTasks { token, cleanup }
}

impl BackgroundTasks {
    /// Cancel all tasks and wait for them to finish their current unit of work.
    pub async fn shutdown(self) {
        self.token.cancel();

        let timeout = Duration::from_secs(CLEANUP_SHUTDOWN_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, self.cleanup).await {
            Ok(Ok(())) => tracing::info!("Cleanup task stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Cleanup task panicked"),
            Err(_) => tracing::warn!(
                timeout_secs = CLEANUP_SHUTDOWN_TIMEOUT_SECS,
                "Cleanup task did not stop in time"
            ),
        }
    }
}
