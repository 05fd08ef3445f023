// ============================================================================
// RustMemoStore Library
// ============================================================================
//
// File-persisted record collections, fully mirrored in memory.
//
// - `core`       record contract and error taxonomy
// - `storage`    codecs and the file-system seam
// - `collection` ordered index and snapshot fan-out
// - `store`      collection store contract, file-backed engine, erased handle
// - `registry`   (type, directory, name) -> store singletons

pub mod collection;
pub mod core;
pub mod prelude;
pub mod registry;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use collection::{BufferingPolicy, Snapshot, SnapshotStream, SubscriptionId};
pub use core::{FsOperation, Record, Result, StoreError, StoreErrorKind, StoreErrorReport};
pub use registry::{CollectionKey, CollectionName, StoreRegistry};
pub use storage::{
    FileSystem, JsonCodec, MemoryFileSystem, MessagePackCodec, RecordCodec, TokioFileSystem,
};
pub use store::{
    AnyStore, CollectionStore, FileStore, MemoryStore, Predicate, StoreConfig, StoreStats,
};
