//! kcst Storage Library
//!
//! This crate owns the two on-disk structures of the retention store:
//!
//! - [`LocalStorage`]: the content directory, one regular file per stored object,
//!   named `<id><extension>`.
//! - [`MetadataStore`]: the metadata map keyed by object id, persisted as a single
//!   JSON snapshot that is rewritten (temp file + rename) on every mutation.
//!
//! Neither type knows about expiry; that policy lives in `kcst-services`.

pub mod error;
pub mod local;
pub mod metadata;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use local::{LocalStorage, StoredObject};
pub use metadata::MetadataStore;
