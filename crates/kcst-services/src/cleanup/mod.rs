mod service;

pub use service::{CleanupService, MIN_CLEANUP_INTERVAL};
