use super::StoreError;
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::fs;

/// Durable home of the serialized favorites document.
///
/// Implementations only move bytes; decoding and the corruption policy live
/// in [`super::FavoritesStore`].
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Reads the whole document, or `None` if it has never been written.
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replaces the whole document. Readers must observe either the old or
    /// the new contents, never a mix.
    async fn write(&self, contents: &[u8]) -> Result<(), StoreError>;
}

/// A single JSON file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: Utf8PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        FileStorage { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl DocumentStorage for FileStorage {
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Writes to a sibling temp file and renames it over the target.
    async fn write(&self, contents: &[u8]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, contents)
            .await
            .map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// In-memory storage for previews and tests.
///
/// Reads and writes can be made to fail on demand, and every successful
/// write is counted.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    contents: Mutex<Option<Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage that already holds `contents`.
    pub fn with_contents(contents: impl Into<Vec<u8>>) -> Self {
        MemoryStorage {
            contents: Mutex::new(Some(contents.into())),
            ..Self::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current raw contents.
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DocumentStorage for MemoryStorage {
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("read refused".into()));
        }
        Ok(self.contents())
    }

    async fn write(&self, contents: &[u8]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write refused".into()));
        }
        *self
            .contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(contents.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_reads_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_path(&temp_dir, "favorites.json"));
        assert!(storage.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_creates_parent_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_path(&temp_dir, "nested/dir/favorites.json");
        let storage = FileStorage::new(path.clone());

        storage.write(b"first").await.unwrap();
        storage.write(b"second").await.unwrap();

        assert_eq!(storage.read().await.unwrap().unwrap(), b"second");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_read_error_on_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_path(&temp_dir, "favorites.json");
        std::fs::create_dir_all(&path).unwrap();

        let err = FileStorage::new(path).read().await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[tokio::test]
    async fn test_memory_storage_failures() {
        let storage = MemoryStorage::with_contents("{}");
        storage.set_fail_writes(true);
        assert!(storage.write(b"x").await.is_err());
        assert_eq!(storage.write_count(), 0);

        storage.set_fail_reads(true);
        assert!(storage.read().await.is_err());

        storage.set_fail_reads(false);
        storage.set_fail_writes(false);
        storage.write(b"x").await.unwrap();
        assert_eq!(storage.read().await.unwrap().unwrap(), b"x");
        assert_eq!(storage.write_count(), 1);
    }
}
