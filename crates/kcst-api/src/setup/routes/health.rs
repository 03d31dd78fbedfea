//! Health check handlers.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use std::time::Duration;

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Readiness probe - the content directory is reachable.
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    const TIMEOUT: Duration = Duration::from_secs(5);

    let upload_dir = &state.config.storage.upload_dir;
    let storage = match tokio::time::timeout(TIMEOUT, tokio::fs::metadata(upload_dir)).await {
        Ok(Ok(meta)) if meta.is_dir() => "ready".to_string(),
        Ok(Ok(_)) => "not_ready: not a directory".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Storage readiness check failed");
            format!("not_ready: {}", e.kind())
        }
        Err(_) => {
            tracing::error!("Storage readiness check timed out");
            "timeout".to_string()
        }
    };

    let ready = storage == "ready";
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "storage": storage,
            "metadata": if state.store.is_degraded() { "degraded" } else { "ok" },
        })),
    )
}
