//! Cross-process advisory lock guarding catalog read-modify-write cycles.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult, StorageError};

/// Default bounded wait for the catalog lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Exclusive lock on a lock file, released when dropped.
#[derive(Debug)]
pub struct CatalogLock {
    file: File,
    path: PathBuf,
}

impl CatalogLock {
    /// Take the lock, polling until `timeout` elapses.
    pub async fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> CatalogResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| StorageError::io(&path, e))?;

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => {
                    debug!(lock = %path.display(), waited_ms = started.elapsed().as_millis() as u64, "Acquired catalog lock");
                    return Ok(Self { file, path });
                }
                Err(TryLockError::WouldBlock) => {
                    if started.elapsed() >= timeout {
                        warn!(lock = %path.display(), "Timed out waiting for catalog lock");
                        return Err(CatalogError::LockTimeout {
                            lock: path,
                            waited: started.elapsed(),
                        });
                    }
                    sleep(POLL_INTERVAL).await;
                }
                Err(TryLockError::Error(e)) => return Err(StorageError::io(&path, e).into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CatalogLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(lock = %self.path.display(), error = %e, "Failed to release catalog lock");
        } else {
            debug!(lock = %self.path.display(), "Released catalog lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::scratch_dir;

    #[tokio::test]
    async fn test_second_acquire_times_out_until_drop() {
        let dir = scratch_dir();
        let path = dir.path().join("catalog.jsonl.lock");

        let first = CatalogLock::acquire(&path, DEFAULT_LOCK_TIMEOUT).await.unwrap();
        let second = CatalogLock::acquire(&path, Duration::from_millis(250)).await;
        assert!(matches!(second, Err(CatalogError::LockTimeout { .. })));

        drop(first);
        let third = CatalogLock::acquire(&path, Duration::from_millis(250)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let dir = scratch_dir();
        let path = dir.path().join("nested/deeper/catalog.lock");
        let lock = CatalogLock::acquire(&path, DEFAULT_LOCK_TIMEOUT).await.unwrap();
        assert_eq!(lock.path(), path.as_path());
        assert!(path.exists());
    }
}
