pub mod broadcast;
pub mod ordered;

pub use broadcast::{BufferingPolicy, Snapshot, SnapshotStream, SubscriberSet, SubscriptionId};
pub use ordered::OrderedCollection;
