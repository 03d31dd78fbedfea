//! The retention store: content directory plus metadata, with read-time expiry.

use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use kcst_core::{FileRecord, RetentionConfig, StorageConfig};
use kcst_storage::{LocalStorage, MetadataStore, StorageError, StorageResult};
use tokio::fs::File;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use crate::retention::RetentionPolicy;

/// Attempts at finding an unused id before giving up.
pub const MAX_ID_ATTEMPTS: u32 = 16;

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records that were expired when the pass started
    pub expired: usize,
    /// Records whose file and metadata were both removed
    pub removed: usize,
    /// Records left in place because a removal failed
    pub failed: usize,
    /// The pass stopped early because its token was cancelled
    pub cancelled: bool,
}

pub struct FileStore {
    retention: RetentionConfig,
    policy: RetentionPolicy,
    storage: LocalStorage,
    metadata: MetadataStore,
}

impl FileStore {
    pub fn new(retention: RetentionConfig, storage: LocalStorage, metadata: MetadataStore) -> Self {
        Self {
            policy: RetentionPolicy::from(&retention),
            retention,
            storage,
            metadata,
        }
    }

    /// Open the content directory and the metadata snapshot named in `storage`.
    pub async fn open(storage: &StorageConfig, retention: RetentionConfig) -> StorageResult<Self> {
        let content = LocalStorage::new(&storage.upload_dir).await?;
        let metadata = MetadataStore::open(&storage.db_path).await?;
        Ok(Self::new(retention, content, metadata))
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Time to live of `record` under the current retention settings.
    pub fn ttl(&self, record: &FileRecord) -> Duration {
        self.policy.ttl(record.size)
    }

    pub fn expires_at(&self, record: &FileRecord) -> DateTime<Utc> {
        record.expires_at(self.ttl(record))
    }

    pub fn is_expired_at(&self, record: &FileRecord, now: DateTime<Utc>) -> bool {
        record.is_expired_at(self.ttl(record), now)
    }

    /// Store the bytes from `reader` under a freshly generated name.
    ///
    /// Returns the stored name and the persisted record. Uploads larger than
    /// `max_file_size` are rejected with `TooLarge` and leave nothing behind. If
    /// the record cannot be persisted the file stays on disk until the orphan
    /// scan reclaims it.
    ///
    /// The id is reserved in the metadata store before any byte is written, so
    /// two concurrent uploads can never end up sharing one.
    pub async fn save(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        original_name: &str,
        content_type: &str,
    ) -> StorageResult<(String, FileRecord)> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = generate_id();
            if !self.metadata.reserve(&id).await {
                tracing::debug!(id = %id, attempt, "Generated id already in use, retrying");
                continue;
            }

            let stored_name = FileRecord::stored_name_for(&id, original_name);
            let size = match self
                .storage
                .write_new(&stored_name, reader, self.retention.max_file_size)
                .await
            {
                Ok(size) => size,
                Err(StorageError::AlreadyExists(_)) => {
                    self.metadata.release(&id).await;
                    tracing::debug!(
                        stored_name = %stored_name,
                        attempt,
                        "Stored name already taken on disk, retrying"
                    );
                    continue;
                }
                Err(e) => {
                    self.metadata.release(&id).await;
                    return Err(e);
                }
            };

            let record = FileRecord::new(id, original_name, content_type, size, Utc::now());
            match self.metadata.insert_new(record.clone()).await {
                Ok(()) => {}
                Err(StorageError::AlreadyExists(id)) => {
                    // Only reachable if a record was written without a reservation.
                    self.metadata.release(&id).await;
                    if let Err(e) = self.storage.remove(&stored_name).await {
                        tracing::warn!(error = %e, stored_name = %stored_name, "Failed to remove rejected upload");
                    }
                    tracing::error!(id = %id, "Reserved id was taken by another record");
                    return Err(StorageError::AlreadyExists(id));
                }
                Err(e) => {
                    self.metadata.release(&record.id).await;
                    tracing::error!(
                        error = %e,
                        stored_name = %stored_name,
                        "Failed to persist metadata, file left on disk"
                    );
                    return Err(e);
                }
            }

            tracing::info!(
                id = %record.id,
                stored_name = %stored_name,
                original_name = %record.original_name,
                size_bytes = size,
                ttl_secs = self.ttl(&record).as_secs(),
                "File stored"
            );

            return Ok((stored_name, record));
        }

        Err(StorageError::IdExhausted(MAX_ID_ATTEMPTS))
    }

    /// Open a live object for reading.
    ///
    /// Missing records, expired records and records whose file is gone are all
    /// reported as `NotFound`.
    pub async fn get(&self, stored_name: &str) -> StorageResult<(File, FileRecord)> {
        let record = self
            .metadata
            .get_by_stored_name(stored_name)
            .await
            .ok_or_else(|| StorageError::NotFound(stored_name.to_string()))?;

        if self.is_expired_at(&record, Utc::now()) {
            return Err(StorageError::NotFound(stored_name.to_string()));
        }

        let file = self.storage.open(&record.stored_name).await?;
        Ok((file, record))
    }

    /// The metadata snapshot could not be loaded at startup; see
    /// [`MetadataStore::is_degraded`].
    pub fn is_degraded(&self) -> bool {
        self.metadata.is_degraded()
    }

    /// Number of records, expired or not.
    pub async fn record_count(&self) -> usize {
        self.metadata.len().await
    }

    /// All records, expired or not.
    pub async fn list(&self) -> Vec<FileRecord> {
        self.metadata.list().await
    }

    /// Remove every expired object.
    pub async fn cleanup(&self) -> SweepReport {
        self.cleanup_until(&CancellationToken::new()).await
    }

    /// Remove expired objects until done or until `token` is cancelled.
    ///
    /// The token is only checked between records, so a file is never removed
    /// without also attempting to delete its record. Per-record failures are
    /// logged and counted; the pass always continues.
    pub async fn cleanup_until(&self, token: &CancellationToken) -> SweepReport {
        let now = Utc::now();
        let expired: Vec<FileRecord> = self
            .metadata
            .list()
            .await
            .into_iter()
            .filter(|record| self.is_expired_at(record, now))
            .collect();

        let mut report = SweepReport {
            expired: expired.len(),
            ..SweepReport::default()
        };

        for record in expired {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }

            tracing::info!(
                id = %record.id,
                stored_name = %record.stored_name,
                expires_at = %self.expires_at(&record),
                "Deleting expired file"
            );

            match self.storage.remove(&record.stored_name).await {
                Ok(true) => {
                    tracing::debug!(stored_name = %record.stored_name, "Removed file from disk");
                }
                Ok(false) => {
                    tracing::debug!(
                        stored_name = %record.stored_name,
                        "File already gone, deleting record"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        stored_name = %record.stored_name,
                        "Failed to remove expired file, keeping its record"
                    );
                    report.failed += 1;
                    continue;
                }
            }

            match self.metadata.delete(&record.id).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        id = %record.id,
                        "Failed to delete expired record"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Remove files that have no record and were last modified more than
    /// `grace` ago. A zero grace period disables the scan.
    ///
    /// Skipped entirely while the metadata store is degraded: after a lost
    /// snapshot every live file would look orphaned.
    pub async fn reclaim_orphans(&self, grace: Duration) -> StorageResult<usize> {
        if grace.is_zero() {
            return Ok(0);
        }
        if self.metadata.is_degraded() {
            tracing::warn!(
                quarantined = ?self.metadata.quarantined_snapshot(),
                "Metadata snapshot was not loaded, skipping orphan scan"
            );
            return Ok(0);
        }

        let known: HashSet<String> = self
            .metadata
            .list()
            .await
            .into_iter()
            .map(|record| record.stored_name)
            .collect();

        let cutoff = SystemTime::now()
            .checked_sub(grace)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        for object in self.storage.list().await? {
            if known.contains(&object.name) || object.modified > cutoff {
                continue;
            }
            // Re-check: the record may have been written since the listing.
            if self.metadata.get_by_stored_name(&object.name).await.is_some() {
                continue;
            }

            match self.storage.remove(&object.name).await {
                Ok(true) => {
                    tracing::info!(
                        stored_name = %object.name,
                        size_bytes = object.size,
                        "Removed orphaned file"
                    );
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        stored_name = %object.name,
                        "Failed to remove orphaned file"
                    );
                }
            }
        }

        Ok(removed)
    }
}

/// 8 lowercase hex characters from 4 random bytes.
fn generate_id() -> String {
    let bytes: [u8; 4] = rand::random();
    hex::encode(bytes)
}
