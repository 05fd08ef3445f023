//! Snapshot fan-out.
//!
//! Every subscriber owns a private buffer guarded by its [`BufferingPolicy`].
//! The owning store pushes the same [`Snapshot`] into every buffer while it
//! still holds its exclusive-access lock, so each subscriber sees snapshots in
//! mutation order. Dropping a [`SnapshotStream`] detaches its buffer and
//! removes it from the set right away; dropping the [`SubscriberSet`] closes
//! every stream once their buffers are drained.
//!
//! `tokio::sync::mpsc` has no drop-oldest mode and `tokio::sync::broadcast`
//! shares one lagging ring with no backpressure, so all four policies run on
//! the same `VecDeque` buffer.

use futures::Stream;
use futures::task::AtomicWaker;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use tokio::sync::Notify;
use tracing::trace;

/// Ordered, complete copy of a collection at one instant.
pub type Snapshot<R> = Arc<Vec<R>>;

/// What a subscriber's buffer does when it holds `capacity` undelivered snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferingPolicy {
    /// Never drops, never waits.
    #[default]
    Unbounded,
    /// Evicts the oldest buffered snapshot to make room for the new one.
    DropOldest(usize),
    /// Discards the new snapshot.
    DropNewest(usize),
    /// Makes the publishing mutation wait until the subscriber catches up.
    Bounded(usize),
}

impl BufferingPolicy {
    fn capacity(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::DropOldest(capacity) | Self::DropNewest(capacity) | Self::Bounded(capacity) => {
                Some((*capacity).max(1))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Returned by a send into a buffer whose stream is gone.
#[derive(Debug)]
struct Detached;

struct Buffer<R> {
    queue: VecDeque<Snapshot<R>>,
    closed: bool,
    detached: bool,
}

struct Channel<R> {
    policy: BufferingPolicy,
    buffer: Mutex<Buffer<R>>,
    receiver: AtomicWaker,
    space: Notify,
}

impl<R> Channel<R> {
    fn new(policy: BufferingPolicy) -> Self {
        Self {
            policy,
            buffer: Mutex::new(Buffer {
                queue: VecDeque::new(),
                closed: false,
                detached: false,
            }),
            receiver: AtomicWaker::new(),
            space: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffer<R>> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffers the first snapshot regardless of policy.
    fn prime(&self, snapshot: Snapshot<R>) {
        self.lock().queue.push_back(snapshot);
    }

    async fn send(&self, snapshot: Snapshot<R>) -> Result<(), Detached> {
        let mut pending = Some(snapshot);
        loop {
            {
                let mut buffer = self.lock();
                if buffer.detached {
                    return Err(Detached);
                }
                let capacity = self.policy.capacity();
                let full = capacity.is_some_and(|capacity| buffer.queue.len() >= capacity);
                match (self.policy, full) {
                    (_, false) => {
                        if let Some(snapshot) = pending.take() {
                            buffer.queue.push_back(snapshot);
                        }
                    }
                    (BufferingPolicy::DropOldest(_), true) => {
                        buffer.queue.pop_front();
                        if let Some(snapshot) = pending.take() {
                            buffer.queue.push_back(snapshot);
                        }
                    }
                    (BufferingPolicy::DropNewest(_), true) => {
                        pending = None;
                    }
                    (_, true) => {}
                }
            }
            if pending.is_none() {
                break;
            }
            // Only `Bounded` gets here; a stored permit covers a pop that raced the check.
            self.space.notified().await;
        }
        self.receiver.wake();
        Ok(())
    }

    fn poll_recv(&self, cx: &mut Context<'_>) -> Poll<Option<Snapshot<R>>> {
        self.receiver.register(cx.waker());
        let mut buffer = self.lock();
        if let Some(snapshot) = buffer.queue.pop_front() {
            drop(buffer);
            self.space.notify_one();
            return Poll::Ready(Some(snapshot));
        }
        if buffer.closed {
            return Poll::Ready(None);
        }
        Poll::Pending
    }

    fn close(&self) {
        self.lock().closed = true;
        self.receiver.wake();
    }

    fn detach(&self) {
        {
            let mut buffer = self.lock();
            buffer.detached = true;
            buffer.queue.clear();
        }
        self.space.notify_one();
    }

    fn buffered(&self) -> usize {
        self.lock().queue.len()
    }
}

/// Live subscribers of one collection.
pub struct SubscriberSet<R> {
    next_id: AtomicU64,
    channels: Mutex<HashMap<SubscriptionId, Arc<Channel<R>>>>,
}

impl<R> Default for SubscriberSet<R> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            channels: Mutex::new(HashMap::new()),
        }
    }
}

impl<R: Send + Sync + 'static> SubscriberSet<R> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Arc<Channel<R>>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subscriber whose first value is `initial`.
    ///
    /// Callers must hold the collection's exclusive access so that no snapshot
    /// produced after `initial` can be published before the registration.
    pub fn subscribe(
        self: &Arc<Self>,
        policy: BufferingPolicy,
        initial: Snapshot<R>,
    ) -> SnapshotStream<R> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let channel = Arc::new(Channel::new(policy));
        channel.prime(initial);
        self.channels().insert(id, channel.clone());
        trace!(subscription = %id, ?policy, "subscriber registered");

        SnapshotStream {
            id,
            channel,
            set: Arc::downgrade(self),
        }
    }

    /// Pushes `snapshot` to every live subscriber. Only `Bounded` subscribers
    /// can make this wait.
    pub async fn publish(&self, snapshot: Snapshot<R>) {
        let targets: Vec<(SubscriptionId, Arc<Channel<R>>)> = self
            .channels()
            .iter()
            .map(|(id, channel)| (*id, channel.clone()))
            .collect();

        for (id, channel) in targets {
            if channel.send(snapshot.clone()).await.is_err() {
                self.unsubscribe(id);
            }
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.channels().remove(&id);
        if let Some(channel) = &removed {
            channel.detach();
            trace!(subscription = %id, "subscriber removed");
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.channels().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels().is_empty()
    }

    /// Ends every stream after it drains what is already buffered.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.channels().drain().collect();
        for (_, channel) in drained {
            channel.close();
        }
    }
}

impl<R> Drop for SubscriberSet<R> {
    fn drop(&mut self) {
        let channels = self.channels.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, channel) in channels.drain() {
            channel.close();
        }
    }
}

/// Live sequence of snapshots: the state at subscribe time first, then one per
/// committed mutation. Dropping the stream cancels the subscription.
pub struct SnapshotStream<R> {
    id: SubscriptionId,
    channel: Arc<Channel<R>>,
    set: Weak<SubscriberSet<R>>,
}

impl<R> SnapshotStream<R> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Number of snapshots delivered to the buffer but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.channel.buffered()
    }
}

impl<R> fmt::Debug for SnapshotStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStream")
            .field("id", &self.id)
            .field("policy", &self.channel.policy)
            .finish()
    }
}

impl<R> Stream for SnapshotStream<R> {
    type Item = Snapshot<R>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.channel.poll_recv(cx)
    }
}

impl<R> Drop for SnapshotStream<R> {
    fn drop(&mut self) {
        self.channel.detach();
        if let Some(set) = self.set.upgrade() {
            let mut channels = set.channels.lock().unwrap_or_else(PoisonError::into_inner);
            if channels.remove(&self.id).is_some() {
                trace!(subscription = %self.id, "subscriber cancelled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    fn snap(values: &[u32]) -> Snapshot<u32> {
        Arc::new(values.to_vec())
    }

    async fn drain(stream: &mut SnapshotStream<u32>) -> Vec<Vec<u32>> {
        let mut seen = Vec::new();
        while SnapshotStream::buffered(stream) > 0 {
            let next = stream.next().await.unwrap();
            seen.push(next.to_vec());
        }
        seen
    }

    #[tokio::test]
    async fn first_value_is_initial_snapshot() {
        let set = SubscriberSet::new();
        let mut stream = set.subscribe(BufferingPolicy::Unbounded, snap(&[1, 2]));
        assert_eq!(*stream.next().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn unbounded_keeps_everything_in_order() {
        let set = SubscriberSet::new();
        let mut stream = set.subscribe(BufferingPolicy::Unbounded, snap(&[]));
        for n in 1..=4 {
            set.publish(snap(&[n])).await;
        }
        assert_eq!(drain(&mut stream).await, vec![vec![], vec![1], vec![2], vec![3], vec![4]]);
    }

    #[tokio::test]
    async fn drop_oldest_keeps_latest_values() {
        let set = SubscriberSet::new();
        let mut stream = set.subscribe(BufferingPolicy::DropOldest(2), snap(&[0]));
        for n in 1..=4 {
            set.publish(snap(&[n])).await;
        }
        assert_eq!(drain(&mut stream).await, vec![vec![3], vec![4]]);
    }

    #[tokio::test]
    async fn drop_newest_keeps_earliest_values() {
        let set = SubscriberSet::new();
        let mut stream = set.subscribe(BufferingPolicy::DropNewest(2), snap(&[0]));
        for n in 1..=4 {
            set.publish(snap(&[n])).await;
        }
        assert_eq!(drain(&mut stream).await, vec![vec![0], vec![1]]);
    }

    #[tokio::test]
    async fn bounded_publisher_waits_for_consumer() {
        let set = SubscriberSet::new();
        let mut stream = set.subscribe(BufferingPolicy::Bounded(1), snap(&[0]));

        let publisher = {
            let set = set.clone();
            tokio::spawn(async move {
                set.publish(snap(&[1])).await;
                set.publish(snap(&[2])).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!publisher.is_finished());

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(stream.next().await.unwrap().to_vec());
        }
        publisher.await.unwrap();
        assert_eq!(seen, vec![vec![0], vec![1], vec![2]]);
    }

    #[tokio::test]
    async fn dropping_stream_unblocks_bounded_publisher() {
        let set = SubscriberSet::new();
        let stream = set.subscribe(BufferingPolicy::Bounded(1), snap(&[0]));

        let publisher = {
            let set = set.clone();
            tokio::spawn(async move { set.publish(snap(&[1])).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(stream);

        tokio::time::timeout(Duration::from_secs(1), publisher)
            .await
            .unwrap()
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn dropping_stream_removes_only_that_subscriber() {
        let set = SubscriberSet::new();
        let first = set.subscribe(BufferingPolicy::Unbounded, snap(&[]));
        let mut second = set.subscribe(BufferingPolicy::Unbounded, snap(&[]));
        assert_eq!(set.len(), 2);

        drop(first);
        assert_eq!(set.len(), 1);

        set.publish(snap(&[9])).await;
        assert_eq!(drain(&mut second).await, vec![vec![], vec![9]]);
    }

    #[tokio::test]
    async fn closing_set_ends_streams_after_drain() {
        let set = SubscriberSet::new();
        let mut stream = set.subscribe(BufferingPolicy::Unbounded, snap(&[5]));
        drop(set);

        assert_eq!(*stream.next().await.unwrap(), vec![5]);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn pending_consumer_is_woken_by_publish() {
        let set = SubscriberSet::new();
        let mut stream = set.subscribe(BufferingPolicy::Unbounded, snap(&[]));
        stream.next().await.unwrap();

        let consumer = tokio::spawn(async move { stream.next().await.map(|s| s.to_vec()) });
        tokio::time::sleep(Duration::from_millis(10)).await;
        set.publish(snap(&[7])).await;

        assert_eq!(consumer.await.unwrap(), Some(vec![7]));
    }
}
