use crate::collection::{BufferingPolicy, SnapshotStream};
use crate::core::{Record, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Borrowed record predicate used by query operations.
pub type Predicate<'a, R> = &'a (dyn Fn(&R) -> bool + Send + Sync);

/// Operations every collection store offers, whatever keeps its records.
///
/// Results that list records always follow collection order: insertion order,
/// with updates keeping their slot.
#[async_trait]
pub trait CollectionStore<R: Record>: Send + Sync {
    /// Fails with `AlreadyExists` when the identifier is taken.
    async fn insert(&self, record: R) -> Result<()>;

    /// Replaces the record with the same identifier or appends a new one.
    async fn upsert(&self, record: R) -> Result<()>;

    /// Fails with `NotFound` when the identifier is absent.
    async fn update(&self, record: R) -> Result<()>;

    async fn delete(&self, id: &R::Id) -> Result<()>;

    /// Deletes every id or none: the first absent id fails the whole call.
    async fn delete_many(&self, ids: &[R::Id]) -> Result<()>;

    async fn delete_all(&self) -> Result<()>;

    /// Replaces content and order with `records`.
    async fn replace_all(&self, records: Vec<R>) -> Result<()>;

    async fn read(&self, id: &R::Id) -> Result<R>;

    async fn all(&self) -> Result<Vec<R>>;

    /// Like [`all`](Self::all), but re-reads the backing storage first.
    async fn load_all(&self) -> Result<Vec<R>>;

    async fn filter(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>>;

    async fn first(&self, predicate: Predicate<'_, R>) -> Result<Option<R>>;

    async fn contains(&self, id: &R::Id) -> Result<bool>;

    async fn exists(&self, id: &R::Id) -> Result<bool> {
        self.contains(id).await
    }

    async fn contains_where(&self, predicate: Predicate<'_, R>) -> Result<bool>;

    async fn count(&self) -> Result<usize>;

    async fn count_where(&self, predicate: Predicate<'_, R>) -> Result<usize>;

    /// Opens a stream whose first value is the current collection, followed by
    /// one snapshot per committed mutation.
    async fn subscribe(&self, policy: BufferingPolicy) -> Result<SnapshotStream<R>>;
}

#[async_trait]
impl<R, S> CollectionStore<R> for Arc<S>
where
    R: Record,
    S: CollectionStore<R> + ?Sized,
{
    async fn insert(&self, record: R) -> Result<()> {
        (**self).insert(record).await
    }

    async fn upsert(&self, record: R) -> Result<()> {
        (**self).upsert(record).await
    }

    async fn update(&self, record: R) -> Result<()> {
        (**self).update(record).await
    }

    async fn delete(&self, id: &R::Id) -> Result<()> {
        (**self).delete(id).await
    }

    async fn delete_many(&self, ids: &[R::Id]) -> Result<()> {
        (**self).delete_many(ids).await
    }

    async fn delete_all(&self) -> Result<()> {
        (**self).delete_all().await
    }

    async fn replace_all(&self, records: Vec<R>) -> Result<()> {
        (**self).replace_all(records).await
    }

    async fn read(&self, id: &R::Id) -> Result<R> {
        (**self).read(id).await
    }

    async fn all(&self) -> Result<Vec<R>> {
        (**self).all().await
    }

    async fn load_all(&self) -> Result<Vec<R>> {
        (**self).load_all().await
    }

    async fn filter(&self, predicate: Predicate<'_, R>) -> Result<Vec<R>> {
        (**self).filter(predicate).await
    }

    async fn first(&self, predicate: Predicate<'_, R>) -> Result<Option<R>> {
        (**self).first(predicate).await
    }

    async fn contains(&self, id: &R::Id) -> Result<bool> {
        (**self).contains(id).await
    }

    async fn exists(&self, id: &R::Id) -> Result<bool> {
        (**self).exists(id).await
    }

    async fn contains_where(&self, predicate: Predicate<'_, R>) -> Result<bool> {
        (**self).contains_where(predicate).await
    }

    async fn count(&self) -> Result<usize> {
        (**self).count().await
    }

    async fn count_where(&self, predicate: Predicate<'_, R>) -> Result<usize> {
        (**self).count_where(predicate).await
    }

    async fn subscribe(&self, policy: BufferingPolicy) -> Result<SnapshotStream<R>> {
        (**self).subscribe(policy).await
    }
}
