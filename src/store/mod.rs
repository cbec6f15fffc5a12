//! Durable, observable storage of the favorite set.
//!
//! The store is the only owner of the durable [`FavoriteSet`]. It is cheap to
//! clone and meant to be shared by every session that shows favorites; all
//! changes go through [`FavoritesStore::mutate`], which serializes writers so
//! two sessions favoriting different recipes at once never lose an update.

use crate::model::FavoriteSet;
use camino::Utf8PathBuf;
use futures::stream::{self, Stream};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

mod storage;

pub use storage::{DocumentStorage, FileStorage, MemoryStorage};

/// Errors raised by the favorites store.
///
/// A document that exists but cannot be decoded is not an error: it is
/// replaced by an empty set.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access favorites document {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode favorites: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Favorites storage unavailable: {0}")]
    Unavailable(String),
}

/// Shared handle to the durable favorite set.
#[derive(Clone)]
pub struct FavoritesStore {
    inner: Arc<Inner>,
}

struct Inner {
    storage: Arc<dyn DocumentStorage>,
    /// Last committed set; `None` until the first successful read.
    state: Mutex<Option<FavoriteSet>>,
    updates: watch::Sender<Option<FavoriteSet>>,
}

impl FavoritesStore {
    pub fn new(storage: Arc<dyn DocumentStorage>) -> Self {
        let (updates, _) = watch::channel(None);
        FavoritesStore {
            inner: Arc::new(Inner {
                storage,
                state: Mutex::new(None),
                updates,
            }),
        }
    }

    /// Opens a private store backed by a JSON file at `path`.
    ///
    /// Two stores opened on the same file do not see each other's writes;
    /// sessions that share a file should use [`FavoritesStore::shared`].
    pub fn open(path: impl Into<Utf8PathBuf>) -> Self {
        Self::new(Arc::new(FileStorage::new(path)))
    }

    /// Returns the process-wide store for the JSON file at `path`.
    ///
    /// Every call with the same path returns a handle to the same store, so
    /// all sessions share one cache, one writer lock and one update channel.
    pub fn shared(path: impl Into<Utf8PathBuf>) -> Self {
        static STORES: OnceLock<std::sync::Mutex<HashMap<Utf8PathBuf, FavoritesStore>>> =
            OnceLock::new();

        let path = path.into();
        let mut stores = STORES
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        stores
            .entry(path)
            .or_insert_with_key(|path| Self::open(path.clone()))
            .clone()
    }

    /// Returns true if both handles refer to the same store.
    pub fn same_store(&self, other: &FavoritesStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the current favorite set.
    ///
    /// The first call reads the durable document; a missing document yields
    /// the empty set and a corrupt one is logged and replaced by the empty set.
    /// An unreadable document also yields the empty set, but that result is
    /// not cached, so the next call retries the read.
    pub async fn snapshot(&self) -> FavoriteSet {
        self.try_snapshot().await.unwrap_or_else(|e| {
            warn!(error = %e, "favorites unreadable, using an empty set");
            FavoriteSet::default()
        })
    }

    /// Like [`FavoritesStore::snapshot`], but reports an unreadable document
    /// instead of substituting the empty set.
    pub async fn try_snapshot(&self) -> Result<FavoriteSet, StoreError> {
        let mut state = self.inner.state.lock().await;
        self.current(&mut state).await
    }

    /// Atomically replaces the set with `transform(current)`.
    ///
    /// Calls are serialized: each transform sees the fully committed result
    /// of the previous one, and each call performs exactly one durable write.
    /// On failure nothing is committed and the previous set stays current.
    /// An unreadable document is never overwritten: the call fails without
    /// writing.
    pub async fn mutate<F>(&self, transform: F) -> Result<FavoriteSet, StoreError>
    where
        F: FnOnce(&FavoriteSet) -> FavoriteSet,
    {
        let mut state = self.inner.state.lock().await;
        let current = self.current(&mut state).await?;
        let next = transform(&current);

        let encoded = serde_json::to_vec(&next)?;
        self.inner.storage.write(&encoded).await?;

        *state = Some(next.clone());
        self.inner.updates.send_replace(Some(next.clone()));
        debug!(before = current.len(), after = next.len(), "favorites committed");
        Ok(next)
    }

    /// Returns an endless stream of snapshots.
    ///
    /// Nothing is read until the stream is first polled. The stream then yields
    /// the current set followed by the set committed by every later `mutate`.
    /// Slow consumers only see the latest set. Each call starts a fresh stream.
    /// If the initial read fails the stream retries it on the next poll.
    pub fn observe(&self) -> impl Stream<Item = FavoriteSet> + Send + 'static {
        let store = self.clone();
        stream::unfold(
            (store, None::<watch::Receiver<Option<FavoriteSet>>>),
            |(store, receiver)| async move {
                let mut receiver = match receiver {
                    Some(mut receiver) => {
                        receiver.changed().await.ok()?;
                        receiver
                    }
                    None => loop {
                        match store.try_snapshot().await {
                            Ok(_) => break store.inner.updates.subscribe(),
                            Err(e) => {
                                warn!(error = %e, "favorites not readable yet; retrying");
                                tokio::time::sleep(RETRY_DELAY).await;
                            }
                        }
                    },
                };
                let set = receiver.borrow_and_update().clone().unwrap_or_default();
                Some((set, (store, Some(receiver))))
            },
        )
    }

    async fn current(&self, state: &mut Option<FavoriteSet>) -> Result<FavoriteSet, StoreError> {
        if let Some(set) = state.as_ref() {
            return Ok(set.clone());
        }

        let set = self.read_document().await?;
        *state = Some(set.clone());
        self.inner.updates.send_replace(Some(set.clone()));
        Ok(set)
    }

    async fn read_document(&self) -> Result<FavoriteSet, StoreError> {
        let Some(bytes) = self.inner.storage.read().await? else {
            debug!("no favorites document yet");
            return Ok(FavoriteSet::default());
        };

        match serde_json::from_slice::<FavoriteSet>(&bytes) {
            Ok(set) => {
                debug!(count = set.len(), "favorites loaded");
                Ok(set)
            }
            Err(e) => {
                warn!(error = %e, "favorites document is corrupt, starting from an empty set");
                Ok(FavoriteSet::default())
            }
        }
    }
}

const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(500);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Recipe;
    use futures::StreamExt;
    use tempfile::TempDir;

    fn recipe(id: &str) -> Recipe {
        Recipe::new(id, format!("Recipe {id}"))
    }

    fn file_store(dir: &TempDir) -> FavoritesStore {
        FavoritesStore::open(Utf8PathBuf::from_path_buf(dir.path().join("favorites.json")).unwrap())
    }

    #[tokio::test]
    async fn test_first_access_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = file_store(&temp_dir);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_document_recovers_to_empty() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("favorites.json"), "{not json at all").unwrap();

        let store = file_store(&temp_dir);
        assert!(store.snapshot().await.is_empty());

        let set = store.mutate(|set| set.with(recipe("a"))).await.unwrap();
        assert!(set.contains("a"));
    }

    #[tokio::test]
    async fn test_binary_garbage_recovers_to_empty() {
        let storage = Arc::new(MemoryStorage::with_contents(vec![0xff, 0xfe, 0x00, 0x13]));
        let store = FavoritesStore::new(storage);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let store = file_store(&temp_dir);
        store.mutate(|set| set.with(recipe("a"))).await.unwrap();
        store.mutate(|set| set.with(recipe("b"))).await.unwrap();
        drop(store);

        let reopened = file_store(&temp_dir);
        let set = reopened.snapshot().await;
        let ids: Vec<&str> = set.recipes().iter().map(Recipe::id).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[tokio::test]
    async fn test_one_write_per_mutate() {
        let storage = Arc::new(MemoryStorage::new());
        let store = FavoritesStore::new(storage.clone());

        store.snapshot().await;
        assert_eq!(storage.write_count(), 0);

        store.mutate(|set| set.toggled(&recipe("a"))).await.unwrap();
        store.mutate(|set| set.toggled(&recipe("a"))).await.unwrap();
        assert_eq!(storage.write_count(), 2);
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mutations_lose_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let store = FavoritesStore::new(storage.clone());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .mutate(|set| set.with(recipe(&format!("r{i}"))))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let set = store.snapshot().await;
        assert_eq!(set.len(), 32);
        assert_eq!(storage.write_count(), 32);

        let persisted: FavoriteSet = serde_json::from_slice(&storage.contents().unwrap()).unwrap();
        assert_eq!(persisted, set);
    }

    #[tokio::test]
    async fn test_read_failure_is_not_cached() {
        let storage = Arc::new(MemoryStorage::with_contents(
            r#"{"recipes":[{"id":"a","title":"A"}]}"#,
        ));
        let store = FavoritesStore::new(storage.clone());

        storage.set_fail_reads(true);
        assert!(store.snapshot().await.is_empty());
        assert!(store.try_snapshot().await.is_err());
        assert!(store.mutate(|set| set.with(recipe("b"))).await.is_err());
        assert_eq!(storage.write_count(), 0);

        storage.set_fail_reads(false);
        assert!(store.snapshot().await.contains("a"));
    }

    #[tokio::test]
    async fn test_directory_at_document_path_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("favorites.json")).unwrap();

        let store = file_store(&temp_dir);
        assert!(store.snapshot().await.is_empty());
        assert!(store.mutate(|set| set.with(recipe("a"))).await.is_err());
        assert!(temp_dir.path().join("favorites.json").is_dir());
    }

    #[tokio::test]
    async fn test_shared_store_per_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp_dir.path().join("favorites.json")).unwrap();
        let first = FavoritesStore::shared(path.clone());
        let second = FavoritesStore::shared(path);
        assert!(first.same_store(&second));
        assert!(!first.same_store(&file_store(&temp_dir)));

        assert!(second.snapshot().await.is_empty());
        first.mutate(|set| set.with(recipe("x"))).await.unwrap();
        second.mutate(|set| set.with(recipe("y"))).await.unwrap();

        let reopened = file_store(&temp_dir).snapshot().await;
        assert!(reopened.contains("x"));
        assert!(reopened.contains("y"));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_set() {
        let storage = Arc::new(MemoryStorage::new());
        let store = FavoritesStore::new(storage.clone());
        store.mutate(|set| set.with(recipe("a"))).await.unwrap();

        storage.set_fail_writes(true);
        assert!(store.mutate(|set| set.with(recipe("b"))).await.is_err());

        let set = store.snapshot().await;
        assert!(set.contains("a"));
        assert!(!set.contains("b"));
    }

    #[tokio::test]
    async fn test_observe_emits_after_each_mutation() {
        let store = FavoritesStore::new(Arc::new(MemoryStorage::new()));
        let mut updates = Box::pin(store.observe());

        assert!(updates.next().await.unwrap().is_empty());

        store.mutate(|set| set.with(recipe("a"))).await.unwrap();
        assert!(updates.next().await.unwrap().contains("a"));

        store.mutate(|set| set.without("a")).await.unwrap();
        assert!(updates.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_observe_is_restartable() {
        let store = FavoritesStore::new(Arc::new(MemoryStorage::new()));
        store.mutate(|set| set.with(recipe("a"))).await.unwrap();

        let first = Box::pin(store.observe()).next().await.unwrap();
        let second = Box::pin(store.observe()).next().await.unwrap();
        assert_eq!(first, second);
        assert!(second.contains("a"));
    }
}
