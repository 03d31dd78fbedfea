use crate::constants::{PREVIEW_PREFIX, SERVICE_NAME};
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::utils::base_url::resolve_base_url;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use kcst_core::{format_size, FilePreview};
use std::sync::Arc;

/// `GET /f/{filename}`: metadata for a live file, for link previews.
#[tracing::instrument(skip(state, headers), fields(operation = "preview_file"))]
pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Json<FilePreview>, HttpAppError> {
    // Same visibility rules as the raw route; the file handle is dropped unread.
    let (_file, record) = state.store.get(&filename).await?;

    let base_url = resolve_base_url(state.config.base_url(), &headers);
    let expires_at = state.store.expires_at(&record);

    Ok(Json(FilePreview {
        title: format!("{} - {}", record.original_name, SERVICE_NAME),
        description: format!("Expires {}", expires_at.format("%b %d, %Y")),
        raw_url: format!("{}/{}", base_url, record.stored_name),
        preview_url: format!("{}{}/{}", base_url, PREVIEW_PREFIX, record.stored_name),
        filename: record.stored_name.clone(),
        original_name: record.original_name.clone(),
        size: record.size,
        size_human: format_size(record.size),
        content_type: record.content_type.clone(),
        media_type: record.media_type().to_string(),
        uploaded_at: record.uploaded_at,
        expires_at,
    }))
}
