use super::key::CollectionKey;
use crate::core::{Record, Result, StoreError};
use crate::store::{AnyStore, FileStore, StoreConfig};
use lazy_static::lazy_static;
use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

type ErasedEntry = Box<dyn Any + Send + Sync>;

// Global singleton registry
lazy_static! {
    static ref GLOBAL_REGISTRY: StoreRegistry = StoreRegistry::new(StoreConfig::default());
}

/// Maps a [`CollectionKey`] to its single store instance.
///
/// Resolution is lazy: the first `resolve` for a key builds a JSON
/// [`FileStore`] at [`CollectionKey::file_path`]. `register` installs any other
/// store (an in-memory double, a differently configured file store) under a
/// key and wins over whatever was there.
pub struct StoreRegistry {
    config: StoreConfig,
    stores: RwLock<HashMap<CollectionKey, ErasedEntry>>,
}

impl StoreRegistry {
    /// Get the global registry instance
    ///
    /// Returns the process-wide registry shared by every caller that does not
    /// build its own.
    pub fn global() -> &'static StoreRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            stores: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the store for `R` in `directory` under `name`, creating the
    /// default file-backed store when the key is not registered yet.
    pub async fn resolve<R: Record>(
        &self,
        directory: impl AsRef<Path>,
        name: Option<&str>,
    ) -> Result<AnyStore<R>> {
        let key = CollectionKey::of::<R>(directory.as_ref(), name);

        {
            let stores = self.stores.read().await;
            if let Some(entry) = stores.get(&key) {
                return downcast::<R>(&key, &**entry);
            }
        }

        let mut stores = self.stores.write().await;
        let entry = stores.entry(key.clone()).or_insert_with(|| {
            let path = key.file_path(self.config.extension());
            debug!(key = %key, path = %path.display(), "constructing default store");
            let store: ErasedEntry =
                Box::new(AnyStore::new(FileStore::<R>::with_config(path, &self.config)));
            store
        });
        downcast::<R>(&key, &**entry)
    }

    /// Installs `store` under the key, replacing any existing entry. Returns
    /// `true` when an entry was replaced.
    pub async fn register<R: Record>(
        &self,
        store: AnyStore<R>,
        directory: impl AsRef<Path>,
        name: Option<&str>,
    ) -> bool {
        let key = CollectionKey::of::<R>(directory.as_ref(), name);
        debug!(key = %key, "registering store");
        self.stores
            .write()
            .await
            .insert(key, Box::new(store))
            .is_some()
    }

    /// Removes the entry for the key, returning whether there was one. The
    /// next `resolve` for the key builds a fresh default store.
    pub async fn unregister<R: Record>(&self, directory: impl AsRef<Path>, name: Option<&str>) -> bool {
        let key = CollectionKey::of::<R>(directory.as_ref(), name);
        let removed = self.stores.write().await.remove(&key).is_some();
        if removed {
            debug!(key = %key, "store unregistered");
        }
        removed
    }

    pub async fn contains<R: Record>(&self, directory: impl AsRef<Path>, name: Option<&str>) -> bool {
        let key = CollectionKey::of::<R>(directory.as_ref(), name);
        self.stores.read().await.contains_key(&key)
    }

    pub async fn keys(&self) -> Vec<CollectionKey> {
        self.stores.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.stores.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stores.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.stores.write().await.clear();
    }
}

fn downcast<R: Record>(key: &CollectionKey, entry: &(dyn Any + Send + Sync)) -> Result<AnyStore<R>> {
    entry.downcast_ref::<AnyStore<R>>().cloned().ok_or_else(|| {
        StoreError::unknown(format!(
            "collection '{key}' is registered for a different record type with the same type name"
        ))
    })
}
