use crate::core::Record;
use std::fmt;
use std::path::{Path, PathBuf};

/// Logical name inside one (type, directory) pair.
///
/// `Default` is its own variant rather than a reserved string, so no caller
/// chosen name can collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionName {
    Default,
    Named(String),
}

impl From<Option<&str>> for CollectionName {
    fn from(name: Option<&str>) -> Self {
        match name {
            Some(name) => Self::Named(name.to_string()),
            None => Self::Default,
        }
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "<default>"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Identifies one store instance in a [`StoreRegistry`](super::StoreRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    type_name: &'static str,
    directory: PathBuf,
    name: CollectionName,
}

impl CollectionKey {
    pub fn new(type_name: &'static str, directory: impl Into<PathBuf>, name: CollectionName) -> Self {
        Self {
            type_name,
            directory: directory.into(),
            name,
        }
    }

    pub fn of<R: Record>(directory: impl Into<PathBuf>, name: Option<&str>) -> Self {
        Self::new(R::TYPE_NAME, directory, name.into())
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn name(&self) -> &CollectionName {
        &self.name
    }

    /// Backing file for the default store of this key:
    /// `<Type>.<ext>` or `<Type>.<name>.<ext>`.
    ///
    /// Both parts are percent-encoded, dots included, so distinct keys never
    /// share a file and no part can leave `directory`.
    pub fn file_path(&self, extension: &str) -> PathBuf {
        let stem = escape(self.type_name);
        let file_name = match &self.name {
            CollectionName::Default => format!("{stem}.{extension}"),
            CollectionName::Named(name) => format!("{stem}.{}.{extension}", escape(name)),
        };
        self.directory.join(file_name)
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}#{}",
            self.type_name,
            self.directory.display(),
            self.name
        )
    }
}

fn escape(raw: &str) -> String {
    urlencoding::encode(raw).replace('.', "%2E")
}
