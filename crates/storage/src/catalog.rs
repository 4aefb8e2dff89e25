//! Append-only JSON-lines catalog of delivered products.
//!
//! One catalog file is shared by every process delivering to the same place.
//! Each registration reads the whole file, merges the new entry and writes it
//! back while holding a [`CatalogLock`] scoped to the catalog location.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::error::{CatalogError, CatalogResult, StorageError};
use crate::lock::{CatalogLock, DEFAULT_LOCK_TIMEOUT};
use crate::object_store::{ObjectStorage, S3Uri};

/// A delivered product instant and where it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product: String,
    /// Product instant, ISO 8601
    pub date_time: DateTime<Utc>,
    /// Delivered files (local paths or s3:// URIs)
    pub locations: Vec<String>,
    pub registered_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn new(product: impl Into<String>, date_time: DateTime<Utc>, locations: Vec<String>) -> Self {
        Self {
            product: product.into(),
            date_time,
            locations,
            registered_at: Utc::now(),
        }
    }

    fn same_instant(&self, other: &CatalogEntry) -> bool {
        self.product.eq_ignore_ascii_case(&other.product) && self.date_time == other.date_time
    }
}

/// Result of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registration {
    Registered,
    /// Every (product, instant, location) triple was already recorded
    AlreadyPresent,
}

/// Where the catalog file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLocation {
    Local(PathBuf),
    Remote(S3Uri),
}

impl CatalogLocation {
    /// Lock file for this location: next to a local catalog, under the
    /// system temp dir for remote ones.
    pub fn lock_path(&self) -> PathBuf {
        match self {
            CatalogLocation::Local(path) => {
                let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
                name.push(".lock");
                path.with_file_name(name)
            }
            CatalogLocation::Remote(uri) => {
                let sanitized: String = uri
                    .to_string()
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect();
                std::env::temp_dir().join(format!("radar-catalog-{}.lock", sanitized))
            }
        }
    }
}

impl FromStr for CatalogLocation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("s3://") {
            Ok(CatalogLocation::Remote(s.parse()?))
        } else {
            Ok(CatalogLocation::Local(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for CatalogLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogLocation::Local(path) => write!(f, "{}", path.display()),
            CatalogLocation::Remote(uri) => write!(f, "{}", uri),
        }
    }
}

/// Catalog handle for one location.
#[derive(Debug, Clone)]
pub struct Catalog {
    location: CatalogLocation,
    remote: Option<ObjectStorage>,
    lock_timeout: Duration,
}

impl Catalog {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            location: CatalogLocation::Local(path.into()),
            remote: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Catalog stored at `uri`, accessed through `storage` (bound to the URI's bucket).
    pub fn remote(uri: S3Uri, storage: ObjectStorage) -> Self {
        Self {
            location: CatalogLocation::Remote(uri),
            remote: Some(storage),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn location(&self) -> &CatalogLocation {
        &self.location
    }

    /// Record a delivery. Idempotent on (product, instant, location).
    #[instrument(skip(self, entry), fields(catalog = %self.location, product = %entry.product, date_time = %entry.date_time))]
    pub async fn register(&self, entry: CatalogEntry) -> CatalogResult<Registration> {
        let _lock = CatalogLock::acquire(self.location.lock_path(), self.lock_timeout).await?;

        let mut entries = self.read_entries().await?;
        let Some(entry) = merge(&entries, entry) else {
            debug!("Catalog already holds this delivery");
            return Ok(Registration::AlreadyPresent);
        };

        entries.push(entry);
        self.write_entries(&entries).await?;
        info!(entries = entries.len(), "Registered catalog entry");
        Ok(Registration::Registered)
    }

    /// All entries, read under the lock.
    pub async fn entries(&self) -> CatalogResult<Vec<CatalogEntry>> {
        let _lock = CatalogLock::acquire(self.location.lock_path(), self.lock_timeout).await?;
        self.read_entries().await
    }

    async fn read_entries(&self) -> CatalogResult<Vec<CatalogEntry>> {
        let content = match &self.location {
            CatalogLocation::Local(path) => match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(StorageError::io(path, e).into()),
            },
            CatalogLocation::Remote(uri) => match self.storage()?.get_opt(&uri.key).await? {
                Some(bytes) => bytes.to_vec(),
                None => return Ok(Vec::new()),
            },
        };
        parse_lines(&content, &self.location.to_string())
    }

    async fn write_entries(&self, entries: &[CatalogEntry]) -> CatalogResult<()> {
        let mut content = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut content, entry)?;
            content.push(b'\n');
        }

        match &self.location {
            CatalogLocation::Local(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StorageError::io(parent, e))?;
                }
                // Same-directory temp file so the rename stays atomic
                let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
                tmp_name.push(format!(".{}.tmp", std::process::id()));
                let tmp = path.with_file_name(tmp_name);
                tokio::fs::write(&tmp, &content)
                    .await
                    .map_err(|e| StorageError::io(&tmp, e))?;
                tokio::fs::rename(&tmp, path)
                    .await
                    .map_err(|e| StorageError::io(path, e))?;
            }
            CatalogLocation::Remote(uri) => {
                self.storage()?.put(&uri.key, Bytes::from(content)).await?;
            }
        }
        Ok(())
    }

    fn storage(&self) -> CatalogResult<&ObjectStorage> {
        self.remote.as_ref().ok_or_else(|| {
            StorageError::ObjectStore(format!("no object store configured for {}", self.location)).into()
        })
    }
}

fn parse_lines(content: &[u8], location: &str) -> CatalogResult<Vec<CatalogEntry>> {
    let text = std::str::from_utf8(content).map_err(|e| CatalogError::Corrupt {
        location: location.to_string(),
        line: 0,
        message: e.to_string(),
    })?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| CatalogError::Corrupt {
                location: location.to_string(),
                line: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// The part of `entry` not yet recorded, or `None` when nothing is new.
fn merge(existing: &[CatalogEntry], mut entry: CatalogEntry) -> Option<CatalogEntry> {
    let recorded: Vec<&CatalogEntry> = existing.iter().filter(|e| e.same_instant(&entry)).collect();
    if recorded.is_empty() {
        return Some(entry);
    }

    let mut fresh: Vec<String> = Vec::new();
    for location in entry.locations.drain(..) {
        let known = recorded.iter().any(|e| e.locations.contains(&location));
        if !known && !fresh.contains(&location) {
            fresh.push(location);
        }
    }

    if fresh.is_empty() {
        None
    } else {
        entry.locations = fresh;
        Some(entry)
    }
}
