//! kcst Services Layer
//!
//! This crate is the retention engine: it owns the TTL formula, the
//! [`FileStore`] that gates reads on expiry, and the [`CleanupService`] that
//! sweeps expired and orphaned files in the background. The HTTP layer talks to
//! the store only through `save`, `get`, and the cleanup task.

pub mod cleanup;
pub mod file_store;
pub mod retention;

pub use cleanup::{CleanupService, MIN_CLEANUP_INTERVAL};
pub use file_store::{FileStore, SweepReport, MAX_ID_ATTEMPTS};
pub use kcst_storage::{LocalStorage, MetadataStore, StorageError, StorageResult};
pub use retention::RetentionPolicy;
