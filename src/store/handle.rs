use super::contract::{CollectionStore, Predicate};
use crate::collection::{BufferingPolicy, SnapshotStream};
use crate::core::{Record, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Type-erased collection store.
///
/// Holds any [`CollectionStore`] for records of type `R` behind one concrete,
/// cheaply clonable type. Every operation forwards to the wrapped store;
/// `subscribe` opens a fresh upstream subscription per call and hands its
/// stream through unchanged, so values and closure propagate end to end.
pub struct AnyStore<R: Record> {
    inner: Arc<dyn CollectionStore<R>>,
}

impl<R: Record> AnyStore<R> {
    pub fn new<S>(store: S) -> Self
    where
        S: CollectionStore<R> + 'static,
    {
        Self {
            inner: Arc::new(store),
        }
    }

    pub fn from_arc(inner: Arc<dyn CollectionStore<R>>) -> Self {
        Self { inner }
    }

    /// Returns `true` when both handles forward to the same store instance.
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<R: Record> Clone for AnyStore<R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<R: Record> fmt::Debug for AnyStore<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyStore")
            .field("type", &R::TYPE_NAME)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R: Record> CollectionStore<R> for AnyStore<R> {
    async fn insert(&self, record: R) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn upsert(&self, record: R) -> Result<()> {
        self.inner.upsert(record).await
    }

    async fn update(&self, record: R) -> Result<()> {
        self.inner.update(record).await
    }

    async fn delete(&self, id: &R::Id) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn delete_many(&self, ids: &[R::Id]) -> Result<()> {
        self.inner.delete_many(ids).await
    }

    async fn delete_all(&self) -> Result<()> {
        self.inner.delete_all().await
    }

    async fn replace_all(&self, records: Vec<R>) -> Result<()> {
        self.inner.replace_all(records).await
    }

    async fn read(&self, id: &R::Id) -> Result<R> {
        self.inner.read(id).await
    }

    async fn all(&self) -> Result<Vec<R>> {
        self.inner.all().await
    }

    async fn load_all(&self) -> Result<Vec<R>> {
        self.inner.load_all().await
    }

    async fn filter(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>> {
        self.inner.filter(predicate).await
    }

    async fn first(&self, predicate: Predicate<'_, R>) -> Result<Option<R>> {
        self.inner.first(predicate).await
    }

    async fn contains(&self, id: &R::Id) -> Result<bool> {
        self.inner.contains(id).await
    }

    async fn exists(&self, id: &R::Id) -> Result<bool> {
        self.inner.exists(id).await
    }

    async fn contains_where(&self, predicate: Predicate<'_, R>) -> Result<bool> {
        self.inner.contains_where(predicate).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    async fn count_where(&self, predicate: Predicate<'_, R>) -> Result<usize> {
        self.inner.count_where(predicate).await
    }

    async fn subscribe(&self, policy: BufferingPolicy) -> Result<SnapshotStream<R>> {
        self.inner.subscribe(policy).await
    }
}
