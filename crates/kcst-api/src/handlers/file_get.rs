use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use chrono::{DateTime, Utc};
use kcst_core::AppError;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// `GET /{filename}`: stream a live file back with its recorded content type.
#[tracing::instrument(skip(state, headers), fields(operation = "get_file"))]
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, HttpAppError> {
    let (file, record) = state.store.get(&filename).await?;

    let last_modified = record.uploaded_at.format(HTTP_DATE_FORMAT).to_string();

    if not_modified_since(&headers, record.uploaded_at) {
        return Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::LAST_MODIFIED, last_modified)
            .body(Body::empty())
            .map_err(|e| HttpAppError::from(AppError::Internal(e.to_string())));
    }

    let content_type = HeaderValue::from_str(&record.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(kcst_core::models::DEFAULT_CONTENT_TYPE));

    tracing::debug!(
        stored_name = %record.stored_name,
        size_bytes = record.size,
        "Serving file"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, record.size)
        .header(header::LAST_MODIFIED, last_modified)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to build response");
            HttpAppError::from(AppError::Internal(e.to_string()))
        })
}

/// Whether `If-Modified-Since` is at or after the upload time (second precision).
fn not_modified_since(headers: &HeaderMap, uploaded_at: DateTime<Utc>) -> bool {
    headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .is_some_and(|since| uploaded_at.timestamp() <= since.timestamp())
}
