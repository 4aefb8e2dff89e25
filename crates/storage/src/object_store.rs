//! Object storage interface for delivered products (S3 compatible).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::{aws::AmazonS3Builder, path::Path, ObjectStore};
use radar_common::hive_partition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{StorageError, StorageResult};

/// Connection overrides layered on top of the standard `AWS_*` environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Allow plain HTTP (local MinIO)
    pub allow_http: bool,
}

impl ObjectStorageConfig {
    /// Read `S3_ENDPOINT`, `S3_REGION`, `S3_ACCESS_KEY`, `S3_SECRET_KEY` and `S3_ALLOW_HTTP`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            endpoint: var("S3_ENDPOINT"),
            region: var("S3_REGION"),
            access_key_id: var("S3_ACCESS_KEY"),
            secret_access_key: var("S3_SECRET_KEY"),
            allow_http: var("S3_ALLOW_HTTP")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}

/// An `s3://bucket/key` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct S3Uri {
    pub bucket: String,
    /// Key or prefix inside the bucket, without leading or trailing slashes
    pub key: String,
}

impl S3Uri {
    /// Join a relative key under this URI's key.
    pub fn join(&self, relative: &str) -> String {
        let relative = relative.trim_matches('/');
        if self.key.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.key, relative)
        }
    }
}

impl FromStr for S3Uri {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .trim()
            .strip_prefix("s3://")
            .ok_or_else(|| StorageError::InvalidUri(s.to_string()))?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(StorageError::InvalidUri(s.to_string()));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.trim_matches('/').to_string(),
        })
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "s3://{}", self.bucket)
        } else {
            write!(f, "s3://{}/{}", self.bucket, self.key)
        }
    }
}

/// Object storage client bound to one bucket.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl ObjectStorage {
    /// Create an S3 client for `bucket`, starting from the `AWS_*` environment.
    pub fn new(bucket: &str, config: &ObjectStorageConfig) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(key) = &config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ObjectStore(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self::from_store(Arc::new(store), bucket))
    }

    /// Wrap an existing store (e.g. `object_store::memory::InMemory`).
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Write bytes to a key in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data)
            .await
            .map_err(|e| StorageError::ObjectStore(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a key.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> StorageResult<Bytes> {
        self.get_opt(path)
            .await?
            .ok_or_else(|| StorageError::ObjectStore(format!("Object {} not found", path)))
    }

    /// Read bytes from a key, `None` when it does not exist.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get_opt(&self, path: &str) -> StorageResult<Option<Bytes>> {
        let location = Path::from(path);

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => {
                return Err(StorageError::ObjectStore(format!(
                    "Failed to read {}: {}",
                    path, e
                )))
            }
        };

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::ObjectStore(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(Some(bytes))
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> StorageResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::ObjectStore(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// List keys under a prefix.
    pub async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| StorageError::ObjectStore(format!("List failed: {}", e)))?
        {
            paths.push(meta.location.to_string());
        }

        Ok(paths)
    }
}

/// Path builder for the hive-partitioned delivery layout.
pub struct StoragePath;

impl StoragePath {
    /// Object key for a delivered file.
    /// Format: {prefix}/data/year=Y/month=M/day=D/product=CODE/{filename}
    pub fn data_key(prefix: &str, instant: DateTime<Utc>, product: &str, filename: &str) -> String {
        let relative = format!("data/{}/{}", hive_partition(instant, product), filename);
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            relative
        } else {
            format!("{}/{}", prefix, relative)
        }
    }

    /// Local file path for a delivered file.
    /// Format: {dir}/year=Y/month=M/day=D/product=CODE/{filename}
    pub fn local_file(
        dir: &std::path::Path,
        instant: DateTime<Utc>,
        product: &str,
        filename: &str,
    ) -> PathBuf {
        dir.join(hive_partition(instant, product)).join(filename)
    }

    /// Default catalog key inside a bucket.
    pub fn catalog_key() -> &'static str {
        "catalog/catalog.jsonl"
    }
}
