use crate::error::{StorageError, StorageResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// A regular file found in the content directory.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// Content directory holding one file per stored object.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage instance, creating `base_path` if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            tracing::error!(
                error = %e,
                path = %base_path.display(),
                "Failed to create content directory"
            );
            StorageError::Io(e)
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert a stored name to a path inside the content directory.
    ///
    /// Stored names are flat: no separators, no parent references, no hidden files.
    fn key_to_path(&self, name: &str) -> StorageResult<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        Ok(self.base_path.join(name))
    }

    /// Stream `reader` into a new file called `name` and return the byte count.
    ///
    /// Fails with `AlreadyExists` if the name is taken, and with `TooLarge` (after
    /// removing the partial file) if the reader yields more than `max_bytes`.
    pub async fn write_new(
        &self,
        name: &str,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        max_bytes: u64,
    ) -> StorageResult<u64> {
        let path = self.key_to_path(name)?;
        let start = std::time::Instant::now();

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        // Read one byte past the limit so an oversized upload is detectable.
        let mut limited = reader.take(max_bytes.saturating_add(1));
        let copied = match tokio::io::copy(&mut limited, &mut file).await {
            Ok(copied) => copied,
            Err(e) => {
                drop(file);
                self.discard(&path).await;
                return Err(StorageError::Io(e));
            }
        };

        if copied > max_bytes {
            drop(file);
            self.discard(&path).await;
            return Err(StorageError::TooLarge { max: max_bytes });
        }

        if let Err(e) = file.flush().await {
            drop(file);
            self.discard(&path).await;
            return Err(StorageError::Io(e));
        }
        if let Err(e) = file.sync_all().await {
            drop(file);
            self.discard(&path).await;
            return Err(StorageError::Io(e));
        }

        tracing::debug!(
            path = %path.display(),
            size_bytes = copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage write successful"
        );

        Ok(copied)
    }

    async fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to remove partial upload"
                );
            }
        }
    }

    /// Open a stored file for reading. A missing file is `NotFound`.
    pub async fn open(&self, name: &str) -> StorageResult<fs::File> {
        let path = self.key_to_path(name)?;
        match fs::File::open(&path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Remove a stored file. Returns `false` if it was already absent.
    pub async fn remove(&self, name: &str) -> StorageResult<bool> {
        let path = self.key_to_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// List the regular files in the content directory.
    pub async fn list(&self) -> StorageResult<Vec<StoredObject>> {
        let mut entries = fs::read_dir(&self.base_path).await?;
        let mut objects = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // Removed between read_dir and stat.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            objects.push(StoredObject {
                name,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }

        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_open_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let data = b"test data".to_vec();
        let mut reader = std::io::Cursor::new(data.clone());
        let written = storage
            .write_new("abcd1234.txt", &mut reader, 1024)
            .await
            .unwrap();
        assert_eq!(written, data.len() as u64);

        let mut file = storage.open("abcd1234.txt").await.unwrap();
        let mut read_back = Vec::new();
        file.read_to_end(&mut read_back).await.unwrap();
        assert_eq!(read_back, data);
    }

    #[tokio::test]
    async fn test_write_new_refuses_existing_name() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let mut first = std::io::Cursor::new(b"one".to_vec());
        storage.write_new("same.bin", &mut first, 1024).await.unwrap();

        let mut second = std::io::Cursor::new(b"two".to_vec());
        let result = storage.write_new("same.bin", &mut second, 1024).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));

        let contents = std::fs::read(dir.path().join("same.bin")).unwrap();
        assert_eq!(contents, b"one");
    }

    #[tokio::test]
    async fn test_write_new_enforces_limit() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let mut exact = std::io::Cursor::new(vec![7u8; 16]);
        assert_eq!(storage.write_new("exact.bin", &mut exact, 16).await.unwrap(), 16);

        let mut oversized = std::io::Cursor::new(vec![7u8; 17]);
        let result = storage.write_new("big.bin", &mut oversized, 16).await;
        assert!(matches!(result, Err(StorageError::TooLarge { max: 16 })));
        assert!(!dir.path().join("big.bin").exists());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.open("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.remove("..").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let mut reader = std::io::Cursor::new(b"x".to_vec());
        let result = storage.write_new("/etc/passwd", &mut reader, 1024).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_open_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        let result = storage.open("missing.png").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        assert!(!storage.remove("nonexistent.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_skips_directories() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).await.unwrap();

        std::fs::write(dir.path().join("a.txt"), b"aaa").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let objects = storage.list().await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "a.txt");
        assert_eq!(objects[0].size, 3);
    }
}
