pub mod error;
pub mod record;

pub use error::{FsOperation, Result, StoreError, StoreErrorKind, StoreErrorReport};
pub use record::Record;
