//! Everything application code usually needs in scope.
//!
//! ```
//! use rustmemostore::prelude::*;
//! ```

pub use crate::{
    AnyStore, BufferingPolicy, CollectionStore, FileStore, MemoryStore, Record, StoreError,
    StoreErrorKind, StoreRegistry,
};
pub use futures::StreamExt;
