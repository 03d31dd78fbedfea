//! API constants

/// Service name used in logs and the root info response
pub const SERVICE_NAME: &str = "kcst";

/// Tagline returned from `GET /`
pub const SERVICE_MESSAGE: &str = "Temporary file hosting.";

/// Path prefix of the preview route
pub const PREVIEW_PREFIX: &str = "/f";

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "file";

/// Allowance on top of `max_file_size` for multipart boundaries and part headers
pub const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// How long shutdown waits for the cleanup task to finish its current record
pub const CLEANUP_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
