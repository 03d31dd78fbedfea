//! kcst Core Library
//!
//! This crate provides the domain models, error types, configuration, and unit
//! parsing shared by the storage, service, and API crates.

pub mod config;
pub mod error;
pub mod models;
pub mod units;

// Re-export commonly used types
pub use config::{Config, RetentionConfig, ServerConfig, StorageConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FilePreview, FileRecord, ServiceInfo, UploadResponse};
pub use units::{format_size, parse_duration, parse_size, UnitParseError};
