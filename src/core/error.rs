use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// File-system step that failed while a store talked to its backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FsOperation {
    Exists,
    Read,
    Write,
}

impl fmt::Display for FsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Exists => "exists",
            Self::Read => "read",
            Self::Write => "write",
        };
        write!(f, "{label}")
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record {id} not found")]
    NotFound { id: String },

    #[error("Record {id} already exists")]
    AlreadyExists { id: String },

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("File system operation '{operation}' failed for '{}': {source}", .path.display())]
    FileSystemOperationFailed {
        operation: FsOperation,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown error: {0}")]
    Unknown(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Kind of a [`StoreError`], for callers that only branch on the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    NotFound,
    AlreadyExists,
    EncodingFailed,
    DecodingFailed,
    FileSystemOperationFailed,
    Unknown,
}

/// Serializable form of a [`StoreError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreErrorReport {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    /// Identifiers are carried in their `Debug` rendering.
    pub fn not_found(id: impl fmt::Debug) -> Self {
        Self::NotFound {
            id: format!("{id:?}"),
        }
    }

    pub fn already_exists(id: impl fmt::Debug) -> Self {
        Self::AlreadyExists {
            id: format!("{id:?}"),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Unknown(message.into())
    }

    pub(crate) fn fs(operation: FsOperation, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystemOperationFailed {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> StoreErrorKind {
        match self {
            Self::NotFound { .. } => StoreErrorKind::NotFound,
            Self::AlreadyExists { .. } => StoreErrorKind::AlreadyExists,
            Self::EncodingFailed(_) => StoreErrorKind::EncodingFailed,
            Self::DecodingFailed(_) => StoreErrorKind::DecodingFailed,
            Self::FileSystemOperationFailed { .. } => StoreErrorKind::FileSystemOperationFailed,
            Self::Unknown(_) => StoreErrorKind::Unknown,
        }
    }

    pub fn report(&self) -> StoreErrorReport {
        StoreErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}
