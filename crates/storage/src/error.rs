//! Error types for storage operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Object storage and filesystem failures.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid object store URI '{0}': expected s3://bucket[/prefix]")]
    InvalidUri(String),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Catalog registration and read failures.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The advisory lock could not be taken within the bounded wait.
    #[error("timed out after {waited:?} waiting for catalog lock {lock}")]
    LockTimeout { lock: PathBuf, waited: Duration },

    /// A catalog line could not be parsed; the file is left untouched.
    #[error("catalog {location} is corrupt at line {line}: {message}")]
    Corrupt {
        location: String,
        line: usize,
        message: String,
    },

    #[error("failed to serialize catalog entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type StorageResult<T> = Result<T, StorageError>;
pub type CatalogResult<T> = Result<T, CatalogError>;
