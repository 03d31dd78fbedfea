//! Common utilities for file upload handlers

use std::io;
use std::pin::pin;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use futures::TryStreamExt;
use kcst_core::{AppError, FileRecord};
use kcst_services::FileStore;
use kcst_storage::StorageError;
use tokio_util::io::StreamReader;

use crate::constants::UPLOAD_FIELD;
use crate::error::HttpAppError;

/// Stream the first field named `file` into the store.
///
/// Other fields are skipped. The field body is never buffered in memory: it is
/// copied straight into the content directory, and the store enforces the size
/// limit while copying.
pub async fn store_multipart_file(
    store: &FileStore,
    mut multipart: Multipart,
) -> Result<(String, FileRecord), HttpAppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();

        return store_field(store, field, &original_name, &content_type).await;
    }

    Err(AppError::BadRequest("Failed to get file".to_string()).into())
}

async fn store_field(
    store: &FileStore,
    field: Field<'_>,
    original_name: &str,
    content_type: &str,
) -> Result<(String, FileRecord), HttpAppError> {
    let stream = field.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
    let mut reader = pin!(StreamReader::new(stream));

    match store.save(&mut reader, original_name, content_type).await {
        Ok(saved) => Ok(saved),
        Err(StorageError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
            Err(multipart_read_error(e))
        }
        Err(e) => Err(e.into()),
    }
}

/// Errors from the request body surface as `InvalidData` I/O errors while copying.
fn multipart_read_error(err: io::Error) -> HttpAppError {
    match err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
    {
        Some(multipart) if multipart.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            AppError::PayloadTooLarge(multipart.body_text()).into()
        }
        Some(multipart) => {
            AppError::BadRequest(format!("Failed to read file data: {}", multipart.body_text()))
                .into()
        }
        None => AppError::BadRequest(format!("Failed to read file data: {}", err)).into(),
    }
}
