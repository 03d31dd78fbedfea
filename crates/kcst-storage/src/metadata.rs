//! Durable metadata map for stored files.
//!
//! The whole map is serialized as one JSON snapshot on every mutation. Writes go
//! to `<path>.tmp`, are synced, then renamed over `<path>`, so a crash leaves
//! either the previous snapshot or the new one.
//!
//! A snapshot that cannot be parsed is moved aside to `<path>.corrupt-<unix secs>`
//! and the store opens empty but degraded: callers must not infer from its
//! contents that a stored file has no record.
//!
//! One `RwLock` guards the map and the snapshot rewrite: `put` and `delete` hold
//! the write lock for the in-memory update and the disk write, so they are fully
//! serialized with each other and with readers. Reads hold the shared lock only
//! for the lookup.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use kcst_core::FileRecord;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, FileRecord>,
    /// stored_name -> id
    by_stored_name: HashMap<String, String>,
    /// Ids claimed by uploads that have not been inserted yet.
    reserved: HashSet<String>,
}

impl Inner {
    fn from_records(records: HashMap<String, FileRecord>) -> Self {
        let by_stored_name = records
            .values()
            .map(|r| (r.stored_name.clone(), r.id.clone()))
            .collect();
        Self {
            records,
            by_stored_name,
            reserved: HashSet::new(),
        }
    }

    fn insert(&mut self, record: FileRecord) {
        if let Some(previous) = self.records.get(&record.id) {
            self.by_stored_name.remove(&previous.stored_name);
        }
        self.by_stored_name
            .insert(record.stored_name.clone(), record.id.clone());
        self.records.insert(record.id.clone(), record);
    }

    fn remove(&mut self, id: &str) -> Option<FileRecord> {
        let record = self.records.remove(id)?;
        self.by_stored_name.remove(&record.stored_name);
        Some(record)
    }
}

/// Thread-safe, snapshot-persisted map from file id to [`FileRecord`].
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    /// Where an unreadable snapshot was moved at open time.
    quarantined: Option<PathBuf>,
    inner: RwLock<Inner>,
}

impl MetadataStore {
    /// Open the store at `path`, loading the existing snapshot if there is one.
    ///
    /// A snapshot that cannot be parsed is renamed out of the way and the store
    /// starts empty in degraded mode (see [`MetadataStore::is_degraded`]). If the
    /// bad snapshot cannot be moved, opening fails rather than overwrite it later.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut quarantined = None;
        let records = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, FileRecord>>(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    let target = quarantine_path(&path);
                    fs::rename(&path, &target).await?;
                    tracing::error!(
                        error = %e,
                        path = %path.display(),
                        moved_to = %target.display(),
                        "Metadata snapshot is unreadable, moved aside; starting degraded with an empty store"
                    );
                    quarantined = Some(target);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            records = records.len(),
            degraded = quarantined.is_some(),
            "Metadata store opened"
        );

        Ok(Self {
            path,
            quarantined,
            inner: RwLock::new(Inner::from_records(records)),
        })
    }

    /// True when the snapshot on disk could not be loaded at open time. The
    /// in-memory map is then not a complete view of the content directory.
    pub fn is_degraded(&self) -> bool {
        self.quarantined.is_some()
    }

    pub fn quarantined_snapshot(&self) -> Option<&Path> {
        self.quarantined.as_deref()
    }

    /// Insert or overwrite `record`, then rewrite the snapshot.
    ///
    /// If the snapshot write fails the in-memory map has already changed; the
    /// record must not be assumed durable.
    pub async fn put(&self, record: FileRecord) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        inner.insert(record);
        self.persist(&inner.records).await
    }

    /// Insert `record` only if its id is free, then rewrite the snapshot.
    ///
    /// Fails with `AlreadyExists` and leaves the map untouched when a record
    /// with the same id is present. Releases any reservation held for the id.
    pub async fn insert_new(&self, record: FileRecord) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if inner.records.contains_key(&record.id) {
            return Err(StorageError::AlreadyExists(record.id));
        }
        inner.reserved.remove(&record.id);
        inner.insert(record);
        self.persist(&inner.records).await
    }

    /// Claim `id` for an upload in progress. Returns `false` if the id belongs
    /// to a record or is already claimed.
    pub async fn reserve(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.records.contains_key(id) || inner.reserved.contains(id) {
            return false;
        }
        inner.reserved.insert(id.to_string())
    }

    /// Drop a claim taken with [`MetadataStore::reserve`]. No-op if absent.
    pub async fn release(&self, id: &str) {
        self.inner.write().await.reserved.remove(id);
    }

    /// Look up a record by id. Expiry is not checked.
    pub async fn get(&self, id: &str) -> Option<FileRecord> {
        self.inner.read().await.records.get(id).cloned()
    }

    /// Look up a record by its stored (public) filename.
    pub async fn get_by_stored_name(&self, stored_name: &str) -> Option<FileRecord> {
        let inner = self.inner.read().await;
        inner
            .by_stored_name
            .get(stored_name)
            .and_then(|id| inner.records.get(id))
            .cloned()
    }

    /// Copy of all records, in no particular order.
    pub async fn list(&self) -> Vec<FileRecord> {
        self.inner.read().await.records.values().cloned().collect()
    }

    /// Remove the record for `id` and rewrite the snapshot. Absent ids are a no-op.
    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        if inner.remove(id).is_none() {
            return Ok(());
        }
        self.persist(&inner.records).await
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp: OsString = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }

    /// Write the snapshot. Callers hold the write lock.
    async fn persist(&self, records: &HashMap<String, FileRecord>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        let tmp = self.temp_path();

        let result = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&tmp, &self.path).await?;
            sync_parent_dir(&self.path).await
        }
        .await;

        if let Err(e) = result {
            tracing::error!(
                error = %e,
                path = %self.path.display(),
                "Failed to write metadata snapshot"
            );
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::debug!(error = %cleanup, "Failed to remove temporary snapshot");
                }
            }
            return Err(e.into());
        }

        Ok(())
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut target: OsString = path.as_os_str().to_owned();
    target.push(format!(".corrupt-{}", secs));
    PathBuf::from(target)
}

/// Make a completed rename durable by syncing the directory entry.
#[cfg(unix)]
async fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::File::open(parent).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(id: &str, name: &str) -> FileRecord {
        FileRecord::new(id, name, "text/plain", 11, Utc::now())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("kcst.db")).await.unwrap();

        store.put(record("aaaa0001", "notes.txt")).await.unwrap();

        let by_id = store.get("aaaa0001").await.unwrap();
        assert_eq!(by_id.original_name, "notes.txt");
        let by_name = store.get_by_stored_name("aaaa0001.txt").await.unwrap();
        assert_eq!(by_name, by_id);
        assert!(store.get("aaaa0001").await.is_some());
        assert!(store.get("missing").await.is_none());
        assert!(store.get_by_stored_name("missing.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("kcst.db");

        {
            let store = MetadataStore::open(&path).await.unwrap();
            store.put(record("aaaa0001", "a.png")).await.unwrap();
            store.put(record("aaaa0002", "b.jpg")).await.unwrap();
            store.delete("aaaa0001").await.unwrap();
        }

        let reopened = MetadataStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await, 1);
        assert!(reopened.get("aaaa0001").await.is_none());
        assert_eq!(
            reopened.get_by_stored_name("aaaa0002.jpg").await.unwrap().id,
            "aaaa0002"
        );
        assert!(!dir.path().join("data").join("kcst.db.tmp").exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("kcst.db")).await.unwrap();

        store.put(record("aaaa0001", "a.txt")).await.unwrap();
        store.delete("aaaa0001").await.unwrap();
        store.delete("aaaa0001").await.unwrap();
        store.delete("never-existed").await.unwrap();
        assert_eq!(store.len().await, 0);
        assert!(store.get_by_stored_name("aaaa0001.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_updates_secondary_index() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("kcst.db")).await.unwrap();

        store.put(record("aaaa0001", "a.txt")).await.unwrap();
        store.put(record("aaaa0001", "a.png")).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert!(store.get_by_stored_name("aaaa0001.txt").await.is_none());
        assert!(store.get_by_stored_name("aaaa0001.png").await.is_some());
    }

    #[tokio::test]
    async fn test_list_returns_all_records() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("kcst.db")).await.unwrap();

        for i in 0..5 {
            store
                .put(record(&format!("id{:06}", i), "f.bin"))
                .await
                .unwrap();
        }

        let mut ids: Vec<String> = store.list().await.into_iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(
            ids,
            vec!["id000000", "id000001", "id000002", "id000003", "id000004"]
        );
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_moved_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kcst.db");
        std::fs::write(&path, b"{\"trunc").unwrap();

        let store = MetadataStore::open(&path).await.unwrap();
        assert_eq!(store.len().await, 0);
        assert!(store.is_degraded());

        let moved = store.quarantined_snapshot().unwrap().to_path_buf();
        assert!(moved
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("kcst.db.corrupt-"));
        assert_eq!(std::fs::read(&moved).unwrap(), b"{\"trunc");

        // New writes never touch the preserved copy.
        store.put(record("aaaa0001", "a.txt")).await.unwrap();
        assert_eq!(std::fs::read(&moved).unwrap(), b"{\"trunc");

        let reopened = MetadataStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await, 1);
        assert!(!reopened.is_degraded());
    }

    #[tokio::test]
    async fn test_healthy_snapshot_is_not_degraded() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("kcst.db")).await.unwrap();
        assert!(!store.is_degraded());
        assert!(store.quarantined_snapshot().is_none());
    }

    #[tokio::test]
    async fn test_insert_new_refuses_existing_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kcst.db");
        let store = MetadataStore::open(&path).await.unwrap();

        store.put(record("abcd1234", "first.txt")).await.unwrap();

        let result = store.insert_new(record("abcd1234", "second.png")).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(ref id)) if id == "abcd1234"));

        let kept = store.get("abcd1234").await.unwrap();
        assert_eq!(kept.original_name, "first.txt");
        assert!(store.get_by_stored_name("abcd1234.txt").await.is_some());
        assert!(store.get_by_stored_name("abcd1234.png").await.is_none());

        let reopened = MetadataStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("abcd1234").await.unwrap().original_name, "first.txt");
    }

    #[tokio::test]
    async fn test_reserve_is_exclusive() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::open(dir.path().join("kcst.db")).await.unwrap();
        store.put(record("aaaa0001", "taken.txt")).await.unwrap();

        assert!(!store.reserve("aaaa0001").await);
        assert!(store.reserve("bbbb0002").await);
        assert!(!store.reserve("bbbb0002").await);

        // Inserting consumes the claim; releasing a consumed claim is a no-op.
        store.insert_new(record("bbbb0002", "b.png")).await.unwrap();
        store.release("bbbb0002").await;
        assert!(!store.reserve("bbbb0002").await);

        assert!(store.reserve("cccc0003").await);
        store.release("cccc0003").await;
        assert!(store.reserve("cccc0003").await);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_pick_one_winner() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(
            MetadataStore::open(dir.path().join("kcst.db")).await.unwrap(),
        );

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.reserve("abcd1234").await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_reads_original_snapshot_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kcst.db");
        std::fs::write(
            &path,
            r#"{
  "9f86d081": {
    "id": "9f86d081",
    "original_name": "cat.gif",
    "stored_name": "9f86d081.gif",
    "size": 2048,
    "content_type": "image/gif",
    "uploaded_at": "2024-01-02T03:04:05.123456789Z"
  }
}"#,
        )
        .unwrap();

        let store = MetadataStore::open(&path).await.unwrap();
        let rec = store.get_by_stored_name("9f86d081.gif").await.unwrap();
        assert_eq!(rec.size, 2048);
        assert_eq!(rec.content_type, "image/gif");
    }

    #[tokio::test]
    async fn test_sync_parent_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kcst.db");
        std::fs::write(&path, b"{}").unwrap();

        sync_parent_dir(&path).await.unwrap();
        // A bare file name syncs the working directory.
        sync_parent_dir(Path::new("kcst.db")).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_reports_snapshot_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kcst.db");
        let store = MetadataStore::open(&path).await.unwrap();

        // A directory where the temp snapshot should go makes the write fail.
        std::fs::create_dir(dir.path().join("kcst.db.tmp")).unwrap();

        let result = store.put(record("aaaa0001", "a.txt")).await;
        assert!(matches!(result, Err(crate::StorageError::Io(_))));
        // The in-memory map was already updated.
        assert!(store.get("aaaa0001").await.is_some());
        assert!(!path.exists());
    }
}
