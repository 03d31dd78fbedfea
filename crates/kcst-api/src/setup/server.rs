//! Server startup and graceful shutdown

use crate::setup::BackgroundTasks;
use anyhow::Result;
use axum::Router;
use kcst_core::{format_size, Config};

/// Start the server with graceful shutdown
pub async fn start_server(config: &Config, app: Router, tasks: BackgroundTasks) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let retention = &config.retention;
    tracing::info!(
        max_file_size = %format_size(retention.max_file_size),
        min_ttl = ?retention.min_ttl,
        max_ttl = ?retention.max_ttl,
        cleanup_interval = ?retention.cleanup_interval,
        base_url = config.base_url().unwrap_or("<from request>"),
        "Server ready and accepting connections"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // Stop the sweep even if the server failed.
    tasks.shutdown().await;
    kcst_infra::shutdown_telemetry().await;

    served?;
    Ok(())
}

/// Signal handler for graceful shutdown
///
/// Listens for Ctrl+C (SIGINT) and SIGTERM signals to initiate graceful shutdown.
/// If a handler cannot be installed that branch never completes and the other
/// signal still works.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
