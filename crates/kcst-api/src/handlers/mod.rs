//! HTTP handlers. Each one is a thin adapter over the retention store.

pub mod file_get;
pub mod file_preview;
pub mod file_upload;
pub mod service_info;
