pub mod key;
pub mod store_registry;

pub use key::{CollectionKey, CollectionName};
pub use store_registry::StoreRegistry;
