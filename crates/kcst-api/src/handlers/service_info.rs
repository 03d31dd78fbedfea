use crate::constants::{SERVICE_MESSAGE, SERVICE_NAME};
use crate::state::AppState;
use crate::utils::base_url::resolve_base_url;
use axum::{extract::State, http::HeaderMap, Json};
use kcst_core::{format_size, ServiceInfo};
use std::sync::Arc;

/// `GET /`: what this instance accepts and how long it keeps files.
pub async fn service_info(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<ServiceInfo> {
    let policy = state.store.policy();

    Json(ServiceInfo {
        name: SERVICE_NAME.to_string(),
        message: SERVICE_MESSAGE.to_string(),
        base_url: resolve_base_url(state.config.base_url(), &headers),
        max_file_size: policy.max_file_size(),
        max_file_size_human: format_size(policy.max_file_size()),
        min_retention_ms: duration_ms(policy.min_ttl()),
        max_retention_ms: duration_ms(policy.max_ttl()),
    })
}

pub(crate) fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
