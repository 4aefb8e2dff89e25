//! Storage for the radar retriever.
//!
//! Provides:
//! - Object storage (S3 compatible) for delivered products and remote catalogs
//! - A cross-process advisory lock scoped to a catalog location
//! - The append-only JSON-lines catalog of delivered products

pub mod catalog;
pub mod error;
pub mod lock;
pub mod object_store;

pub use self::object_store::{ObjectStorage, ObjectStorageConfig, S3Uri, StoragePath};
pub use catalog::{Catalog, CatalogEntry, CatalogLocation, Registration};
pub use error::{CatalogError, CatalogResult, StorageError, StorageResult};
pub use lock::{CatalogLock, DEFAULT_LOCK_TIMEOUT};
