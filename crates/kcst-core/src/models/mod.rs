//! Data models for the application
//!
//! `file` holds the persisted metadata record; `response` holds the JSON shapes
//! returned by the HTTP layer.

mod file;
mod response;

// Re-export all models for convenient imports
pub use file::{FileRecord, DEFAULT_CONTENT_TYPE, FALLBACK_EXTENSION};
pub use response::{FilePreview, ServiceInfo, UploadResponse};
