//! Storage error types

use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// No record, an expired record, or a record whose file is gone.
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File exceeds maximum size of {max} bytes")]
    TooLarge { max: u64 },

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Could not allocate a unique file id after {0} attempts")]
    IdExhausted(u32),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
