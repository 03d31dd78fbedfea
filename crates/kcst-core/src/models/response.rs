//! Response bodies returned by the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response body for a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub url: String,
    pub raw_url: String,
    pub preview_url: String,
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub size_human: String,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Retention granted to this file, in milliseconds
    pub retention_ms: u64,
    /// Server-side handling time, in milliseconds
    pub response_ms: u64,
}

/// Metadata shown on a file's preview page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePreview {
    pub title: String,
    pub description: String,
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub size_human: String,
    pub content_type: String,
    /// `image`, `video`, or empty when the browser cannot embed the file
    pub media_type: String,
    pub raw_url: String,
    pub preview_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Service description returned from the root route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub message: String,
    pub base_url: String,
    pub max_file_size: u64,
    pub max_file_size_human: String,
    pub min_retention_ms: u64,
    pub max_retention_ms: u64,
}
