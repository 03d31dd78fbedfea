use crate::constants::PREVIEW_PREFIX;
use crate::error::HttpAppError;
use crate::handlers::service_info::duration_ms;
use crate::state::AppState;
use crate::utils::base_url::resolve_base_url;
use crate::utils::upload::store_multipart_file;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::HeaderMap,
    Json,
};
use kcst_core::{format_size, UploadResponse};
use std::sync::Arc;
use std::time::Instant;

/// `POST /`: store the multipart field `file` and return its links.
#[tracing::instrument(skip(state, headers, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let start = Instant::now();
    let multipart = multipart?;

    let (filename, record) = store_multipart_file(&state.store, multipart).await?;

    let base_url = resolve_base_url(state.config.base_url(), &headers);
    let raw_url = format!("{}/{}", base_url, filename);

    Ok(Json(UploadResponse {
        success: true,
        url: raw_url.clone(),
        raw_url,
        preview_url: format!("{}{}/{}", base_url, PREVIEW_PREFIX, filename),
        original_name: record.original_name.clone(),
        size: record.size,
        size_human: format_size(record.size),
        content_type: record.content_type.clone(),
        uploaded_at: record.uploaded_at,
        expires_at: state.store.expires_at(&record),
        retention_ms: duration_ms(state.store.ttl(&record)),
        response_ms: duration_ms(start.elapsed()),
        filename,
    }))
}
