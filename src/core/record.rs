use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::hash::Hash;

/// A value stored in a collection.
///
/// Records are replaced, never mutated in place: `update`/`upsert` swap the
/// whole value stored under [`Record::id`]. The identifier must stay stable for
/// the lifetime of the record.
///
/// `TYPE_NAME` is the stable tag a [`StoreRegistry`](crate::StoreRegistry) keys
/// on and derives default file names from. It must be distinct per record
/// schema.
///
/// ```
/// use rustmemostore::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Todo {
///     id: u64,
///     title: String,
/// }
///
/// impl Record for Todo {
///     type Id = u64;
///     const TYPE_NAME: &'static str = "Todo";
///
///     fn id(&self) -> &u64 {
///         &self.id
///     }
/// }
/// ```
pub trait Record:
    fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Id: fmt::Debug + Clone + Eq + Hash + Send + Sync + 'static;

    const TYPE_NAME: &'static str;

    fn id(&self) -> &Self::Id;
}
