pub mod config;
pub mod contract;
pub mod file_store;
pub mod handle;

pub use config::StoreConfig;
pub use contract::{CollectionStore, Predicate};
pub use file_store::{FileStore, MemoryStore, StoreStats};
pub use handle::AnyStore;
