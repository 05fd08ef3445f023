//! File-backed collection store.
//!
//! One `FileStore` owns one backing file. All operations queue on a single
//! async mutex, so they run one at a time in acceptance order while separate
//! stores proceed independently. The collection is read lazily from disk on
//! first use; every mutation is staged on a copy of the collection, written in
//! full through an atomic replace and only then swapped in and published.

use super::config::StoreConfig;
use super::contract::{CollectionStore, Predicate};
use crate::collection::{BufferingPolicy, OrderedCollection, Snapshot, SnapshotStream, SubscriberSet};
use crate::core::{FsOperation, Record, Result, StoreError};
use crate::storage::{FileSystem, JsonCodec, MemoryFileSystem, RecordCodec, TokioFileSystem};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// In-memory variant: same engine, files kept in a [`MemoryFileSystem`].
pub type MemoryStore<R> = FileStore<R, JsonCodec, MemoryFileSystem>;

/// Runtime statistics for one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Backing file of the collection.
    pub path: PathBuf,
    /// Records currently held in memory.
    pub record_count: usize,
    /// Live subscriptions.
    pub subscriber_count: usize,
    /// Whether the backing file has been read successfully.
    pub hydrated: bool,
    /// Successful writes since the store was created.
    pub writes: u64,
    /// Timestamp of the last successful write (RFC3339).
    pub last_persisted_at: Option<String>,
}

struct StoreState<R: Record> {
    records: OrderedCollection<R>,
    hydrated: bool,
    writes: u64,
    last_persisted_at: Option<DateTime<Utc>>,
}

/// Everything a detached mutation needs besides the state it locked.
struct Backing<R, C, F>
where
    R: Record,
{
    path: PathBuf,
    codec: C,
    fs: F,
    subscribers: Arc<SubscriberSet<R>>,
}

pub struct FileStore<R, C = JsonCodec, F = TokioFileSystem>
where
    R: Record,
    C: RecordCodec,
    F: FileSystem,
{
    backing: Arc<Backing<R, C, F>>,
    state: Arc<Mutex<StoreState<R>>>,
}

impl<R: Record> FileStore<R> {
    /// Store over `path` on the local disk with default settings.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::with_config(path, &StoreConfig::default())
    }

    pub fn with_config(path: impl Into<PathBuf>, config: &StoreConfig) -> Self {
        Self::with_parts(
            path,
            JsonCodec {
                pretty: config.pretty_json,
            },
            TokioFileSystem::with_fsync(config.fsync),
        )
    }
}

impl<R: Record> FileStore<R, JsonCodec, MemoryFileSystem> {
    /// Store backed by a fresh, private [`MemoryFileSystem`].
    pub fn in_memory() -> Self {
        Self::on_memory(
            MemoryFileSystem::new(),
            PathBuf::from("/memory").join(format!("{}.json", R::TYPE_NAME)),
        )
    }

    /// Store over `path` inside an existing (possibly shared) memory file system.
    pub fn on_memory(fs: MemoryFileSystem, path: impl Into<PathBuf>) -> Self {
        Self::with_parts(path, JsonCodec::new(), fs)
    }
}

impl<R, C, F> FileStore<R, C, F>
where
    R: Record,
    C: RecordCodec,
    F: FileSystem,
{
    pub fn with_parts(path: impl Into<PathBuf>, codec: C, fs: F) -> Self {
        Self {
            backing: Arc::new(Backing {
                path: path.into(),
                codec,
                fs,
                subscribers: SubscriberSet::new(),
            }),
            state: Arc::new(Mutex::new(StoreState {
                records: OrderedCollection::new(),
                hydrated: false,
                writes: 0,
                last_persisted_at: None,
            })),
        }
    }

    pub fn path(&self) -> &Path {
        &self.backing.path
    }

    pub fn codec(&self) -> &C {
        &self.backing.codec
    }

    pub fn file_system(&self) -> &F {
        &self.backing.fs
    }

    pub fn subscriber_count(&self) -> usize {
        self.backing.subscribers.len()
    }

    /// Returns current runtime statistics without touching the backing file.
    pub async fn stats(&self) -> StoreStats {
        let state = self.state.lock().await;
        StoreStats {
            path: self.backing.path.clone(),
            record_count: state.records.len(),
            subscriber_count: self.backing.subscribers.len(),
            hydrated: state.hydrated,
            writes: state.writes,
            last_persisted_at: state.last_persisted_at.map(|at| at.to_rfc3339()),
        }
    }

    async fn hydrated_state(&self) -> Result<MutexGuard<'_, StoreState<R>>> {
        let mut state = self.state.lock().await;
        self.backing.ensure_hydrated(&mut state).await?;
        Ok(state)
    }

    async fn mutate<M>(&self, operation: &'static str, apply: M) -> Result<()>
    where
        M: FnOnce(&mut OrderedCollection<R>) -> Result<()> + Send + 'static,
    {
        let mut state = self.state.clone().lock_owned().await;
        let backing = self.backing.clone();
        run_detached(async move {
            backing.ensure_hydrated(&mut state).await?;
            let mut next = state.records.clone();
            apply(&mut next)?;
            backing.commit(&mut state, next, operation).await
        })
        .await
    }

    /// Mutation that discards the current content, so it skips hydration.
    async fn overwrite(&self, operation: &'static str, next: OrderedCollection<R>) -> Result<()> {
        let mut state = self.state.clone().lock_owned().await;
        let backing = self.backing.clone();
        run_detached(async move { backing.commit(&mut state, next, operation).await }).await
    }

    async fn query<T, Q>(&self, query: Q) -> Result<T>
    where
        Q: FnOnce(&OrderedCollection<R>) -> T + Send,
    {
        let state = self.hydrated_state().await?;
        Ok(query(&state.records))
    }
}

/// Runs `work` on its own task. Work that already holds exclusive access
/// finishes even when the caller stops waiting, so a write that reached the
/// backing file is always swapped in and published.
async fn run_detached<T, W>(work: W) -> Result<T>
where
    T: Send + 'static,
    W: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|err| StoreError::Unknown(Box::new(err)))?
}

impl<R, C, F> Backing<R, C, F>
where
    R: Record,
    C: RecordCodec,
    F: FileSystem,
{
    async fn read_backing_file(&self) -> Result<Vec<R>> {
        let exists = self
            .fs
            .exists(&self.path)
            .await
            .map_err(|err| StoreError::fs(FsOperation::Exists, self.path.clone(), err))?;
        if !exists {
            return Ok(Vec::new());
        }

        let bytes = self
            .fs
            .read(&self.path)
            .await
            .map_err(|err| StoreError::fs(FsOperation::Read, self.path.clone(), err))?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        self.codec.decode(&bytes)
    }

    /// Replaces in-memory state with the backing file content. A failed read
    /// leaves the store unhydrated so the next call tries again.
    async fn hydrate(&self, state: &mut StoreState<R>) -> Result<()> {
        match self.read_backing_file().await {
            Ok(records) => {
                state.records = OrderedCollection::from_records(records);
                state.hydrated = true;
                debug!(
                    path = %self.path.display(),
                    records = state.records.len(),
                    "collection hydrated"
                );
                Ok(())
            }
            Err(err) => {
                state.hydrated = false;
                warn!(path = %self.path.display(), error = %err, "collection hydration failed");
                Err(err)
            }
        }
    }

    async fn ensure_hydrated(&self, state: &mut StoreState<R>) -> Result<()> {
        if state.hydrated {
            return Ok(());
        }
        self.hydrate(state).await
    }

    /// Re-reads the backing file and publishes it when it differs from memory.
    async fn reload(&self, state: &mut StoreState<R>) -> Result<Vec<R>> {
        let before = state.records.clone();
        self.hydrate(state).await?;

        let records = state.records.to_vec();
        if state.records != before && !self.subscribers.is_empty() {
            self.subscribers.publish(Arc::new(records.clone())).await;
        }
        Ok(records)
    }

    /// Persists `next` and, once it is on disk, makes it the current state and
    /// publishes it. On failure nothing changes in memory or on disk.
    async fn commit(
        &self,
        state: &mut StoreState<R>,
        next: OrderedCollection<R>,
        operation: &'static str,
    ) -> Result<()> {
        let snapshot: Snapshot<R> = Arc::new(next.to_vec());

        let bytes = self.codec.encode(snapshot.as_slice()).inspect_err(|err| {
            warn!(operation, path = %self.path.display(), error = %err, "mutation discarded");
        })?;
        self.fs
            .write_atomic(&self.path, &bytes)
            .await
            .map_err(|err| StoreError::fs(FsOperation::Write, self.path.clone(), err))
            .inspect_err(|err| {
                warn!(operation, path = %self.path.display(), error = %err, "mutation discarded");
            })?;

        state.records = next;
        state.hydrated = true;
        state.writes += 1;
        state.last_persisted_at = Some(Utc::now());
        debug!(
            operation,
            path = %self.path.display(),
            bytes = bytes.len(),
            records = snapshot.len(),
            "collection persisted"
        );

        self.subscribers.publish(snapshot).await;
        Ok(())
    }
}

#[async_trait]
impl<R, C, F> CollectionStore<R> for FileStore<R, C, F>
where
    R: Record,
    C: RecordCodec,
    F: FileSystem,
{
    async fn insert(&self, record: R) -> Result<()> {
        self.mutate("insert", |records| records.insert(record)).await
    }

    async fn upsert(&self, record: R) -> Result<()> {
        self.mutate("upsert", |records| {
            records.upsert(record);
            Ok(())
        })
        .await
    }

    async fn update(&self, record: R) -> Result<()> {
        self.mutate("update", |records| records.update(record)).await
    }

    async fn delete(&self, id: &R::Id) -> Result<()> {
        let id = id.clone();
        self.mutate("delete", move |records| records.remove(&id).map(|_| ()))
            .await
    }

    async fn delete_many(&self, ids: &[R::Id]) -> Result<()> {
        let ids = ids.to_vec();
        self.mutate("delete_many", move |records| records.remove_many(&ids))
            .await
    }

    async fn delete_all(&self) -> Result<()> {
        self.overwrite("delete_all", OrderedCollection::new()).await
    }

    async fn replace_all(&self, records: Vec<R>) -> Result<()> {
        self.overwrite("replace_all", OrderedCollection::from_records(records))
            .await
    }

    async fn read(&self, id: &R::Id) -> Result<R> {
        self.query(|records| records.get(id).cloned())
            .await?
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn all(&self) -> Result<Vec<R>> {
        self.query(|records| records.to_vec()).await
    }

    async fn load_all(&self) -> Result<Vec<R>> {
        let mut state = self.state.clone().lock_owned().await;
        let backing = self.backing.clone();
        run_detached(async move { backing.reload(&mut state).await }).await
    }

    async fn filter(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>> {
        self.query(|records| {
            records
                .iter()
                .filter(|record| predicate(record))
                .cloned()
                .collect()
        })
        .await
    }

    async fn first(&self, predicate: Predicate<'_, R>) -> Result<Option<R>> {
        self.query(|records| records.iter().find(|record| predicate(record)).cloned())
            .await
    }

    async fn contains(&self, id: &R::Id) -> Result<bool> {
        self.query(|records| records.contains(id)).await
    }

    async fn contains_where(&self, predicate: Predicate<'_, R>) -> Result<bool> {
        self.query(|records| records.iter().any(|record| predicate(record)))
            .await
    }

    async fn count(&self) -> Result<usize> {
        self.query(|records| records.len()).await
    }

    async fn count_where(&self, predicate: Predicate<'_, R>) -> Result<usize> {
        self.query(|records| records.iter().filter(|record| predicate(record)).count())
            .await
    }

    async fn subscribe(&self, policy: BufferingPolicy) -> Result<SnapshotStream<R>> {
        let state = self.hydrated_state().await?;
        let initial = Arc::new(state.records.to_vec());
        Ok(self.backing.subscribers.subscribe(policy, initial))
    }
}

impl<R, C, F> fmt::Debug for FileStore<R, C, F>
where
    R: Record,
    C: RecordCodec,
    F: FileSystem,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("type", &R::TYPE_NAME)
            .field("path", &self.backing.path)
            .field("subscribers", &self.backing.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StoreErrorKind;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Task {
        id: u32,
        title: String,
        done: bool,
    }

    impl Record for Task {
        type Id = u32;
        const TYPE_NAME: &'static str = "Task";

        fn id(&self) -> &u32 {
            &self.id
        }
    }

    fn task(id: u32, title: &str) -> Task {
        Task {
            id,
            title: title.to_string(),
            done: false,
        }
    }

    #[tokio::test]
    async fn hydration_is_lazy() {
        let fs = MemoryFileSystem::new();
        let store: MemoryStore<Task> = FileStore::on_memory(fs.clone(), "/tasks.json");
        fs.put("/tasks.json", br#"[{"id":1,"title":"seeded","done":false}]"#.to_vec());

        assert!(!store.stats().await.hydrated);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.stats().await.hydrated);
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_and_disk_unchanged() {
        let fs = MemoryFileSystem::new();
        let store: MemoryStore<Task> = FileStore::on_memory(fs.clone(), "/tasks.json");
        store.insert(task(1, "kept")).await.unwrap();
        let on_disk = fs.get("/tasks.json").unwrap();

        fs.set_fail_writes(true);
        let err = store.insert(task(2, "lost")).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::FileSystemOperationFailed);
        let err = store.delete(&1).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::FileSystemOperationFailed);

        assert_eq!(store.all().await.unwrap(), vec![task(1, "kept")]);
        assert_eq!(fs.get("/tasks.json").unwrap(), on_disk);
        assert_eq!(store.stats().await.writes, 1);

        fs.set_fail_writes(false);
        store.insert(task(2, "second try")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn precondition_failure_does_not_write() {
        let store: MemoryStore<Task> = FileStore::in_memory();
        store.insert(task(1, "a")).await.unwrap();

        assert!(store.update(task(9, "ghost")).await.is_err());
        assert!(store.insert(task(1, "dup")).await.is_err());
        assert_eq!(store.stats().await.writes, 1);
    }

    #[tokio::test]
    async fn stats_track_writes_and_subscribers() {
        let store: MemoryStore<Task> = FileStore::in_memory();
        assert_eq!(store.stats().await.last_persisted_at, None);

        store.insert(task(1, "a")).await.unwrap();
        store.upsert(task(1, "b")).await.unwrap();
        let stream = store.subscribe(BufferingPolicy::Unbounded).await.unwrap();

        let stats = store.stats().await;
        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.subscriber_count, 1);
        assert!(stats.last_persisted_at.is_some());
        assert_eq!(stats.path, PathBuf::from("/memory/Task.json"));

        drop(stream);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn replace_all_recovers_from_undecodable_file() {
        let fs = MemoryFileSystem::new();
        fs.put("/tasks.json", b"garbage".to_vec());
        let store: MemoryStore<Task> = FileStore::on_memory(fs.clone(), "/tasks.json");

        let err = store.all().await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::DecodingFailed);
        assert!(!store.stats().await.hydrated);

        store.replace_all(vec![task(4, "fresh")]).await.unwrap();
        assert_eq!(store.all().await.unwrap(), vec![task(4, "fresh")]);
    }
}
