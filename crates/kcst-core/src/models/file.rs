use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extension used when the client filename has none (or an unusable one).
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Content type recorded when the upload does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const MAX_EXTENSION_LEN: usize = 16;

/// Metadata for one stored object.
///
/// `size` and `uploaded_at` never change after creation. Expiry is not stored:
/// it is derived from them with the retention policy in force at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Client-supplied filename, for display only
    pub original_name: String,
    /// `id` plus the lower-cased extension; the on-disk and public filename
    pub stored_name: String,
    pub size: u64,
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(
        id: impl Into<String>,
        original_name: impl Into<String>,
        content_type: impl Into<String>,
        size: u64,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        let original_name = original_name.into();
        let content_type = content_type.into();
        let stored_name = Self::stored_name_for(&id, &original_name);

        Self {
            id,
            original_name,
            stored_name,
            size,
            content_type: if content_type.trim().is_empty() {
                DEFAULT_CONTENT_TYPE.to_string()
            } else {
                content_type
            },
            uploaded_at,
        }
    }

    /// Build the stored filename for `id` from the client's filename.
    pub fn stored_name_for(id: &str, original_name: &str) -> String {
        format!("{}{}", id, Self::extension_of(original_name))
    }

    /// Lower-cased extension of `original_name` including the dot, or `.bin`.
    ///
    /// Only the last path segment is considered, and only short ASCII
    /// alphanumeric extensions are kept since the result ends up in a path and a URL.
    pub fn extension_of(original_name: &str) -> String {
        let base = original_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(original_name);

        match base.rfind('.') {
            Some(dot) => {
                let ext = &base[dot + 1..];
                if !ext.is_empty()
                    && ext.len() <= MAX_EXTENSION_LEN
                    && ext.chars().all(|c| c.is_ascii_alphanumeric())
                {
                    format!(".{}", ext.to_ascii_lowercase())
                } else {
                    FALLBACK_EXTENSION.to_string()
                }
            }
            None => FALLBACK_EXTENSION.to_string(),
        }
    }

    /// Expiry instant for the given TTL. Saturates instead of overflowing.
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.uploaded_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether the record is expired at `now` under the given TTL.
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now > self.expires_at(ttl)
    }

    /// Coarse media kind used by preview clients: `image`, `video`, or empty.
    pub fn media_type(&self) -> &'static str {
        let ct = self.content_type.to_ascii_lowercase();
        if ct.starts_with("image/") {
            "image"
        } else if ct.starts_with("video/") {
            "video"
        } else {
            ""
        }
    }
}
