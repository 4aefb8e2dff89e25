//! Delivery of a transformed payload to its destinations.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use geo_transform::TransformedPayload;
use radar_common::RetryPolicy;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use storage::{ObjectStorage, S3Uri, StoragePath};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Where a payload should go.
#[derive(Debug, Clone)]
pub enum Destination {
    /// Hive-partitioned tree under a local directory
    Local(PathBuf),
    /// Handed back to the caller in memory
    Bytes,
    /// Hive-partitioned keys under an `s3://bucket/prefix`
    ObjectStore { uri: S3Uri, storage: ObjectStorage },
}

/// Kind tag of a [`Destination`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Local,
    Bytes,
    ObjectStore,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationKind::Local => write!(f, "local"),
            DestinationKind::Bytes => write!(f, "bytes"),
            DestinationKind::ObjectStore => write!(f, "object_store"),
        }
    }
}

impl Destination {
    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::Local(_) => DestinationKind::Local,
            Destination::Bytes => DestinationKind::Bytes,
            Destination::ObjectStore { .. } => DestinationKind::ObjectStore,
        }
    }
}

/// Result for one destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationResult {
    pub kind: DestinationKind,
    /// File path or `s3://` URI; absent for in-memory delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
}

/// Aggregate of every destination attempted.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub results: Vec<DestinationResult>,
    /// Payload bytes when in-memory delivery was requested
    pub bytes: Option<Bytes>,
}

impl DeliveryReport {
    pub fn any_ok(&self) -> bool {
        self.results.iter().any(|r| r.ok)
    }

    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }

    /// Locations actually written to disk or object storage.
    pub fn persisted_locations(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.ok)
            .filter_map(|r| r.location.clone())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DestinationResult> {
        self.results.iter().filter(|r| !r.ok)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SinkDispatcher {
    /// Applied to object-store uploads
    retry: RetryPolicy,
}

impl SinkDispatcher {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Attempt every destination; failures are recorded, never propagated.
    #[instrument(skip(self, payload, product, destinations), fields(product = %product, filename = %payload.filename, destinations = destinations.len()))]
    pub async fn deliver(
        &self,
        payload: &TransformedPayload,
        product: &str,
        instant: DateTime<Utc>,
        destinations: &[Destination],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for destination in destinations {
            let result = match destination {
                Destination::Local(dir) => write_local(dir, payload, product, instant).await,
                Destination::Bytes => {
                    report.bytes = Some(payload.bytes.clone());
                    DestinationResult {
                        kind: DestinationKind::Bytes,
                        location: None,
                        ok: true,
                        error: None,
                        attempts: 1,
                    }
                }
                Destination::ObjectStore { uri, storage } => {
                    self.upload(uri, storage, payload, product, instant).await
                }
            };

            if result.ok {
                info!(kind = %result.kind, location = ?result.location, "Delivered");
            } else {
                error!(kind = %result.kind, error = ?result.error, "Delivery failed");
            }
            report.results.push(result);
        }

        report
    }

    async fn upload(
        &self,
        uri: &S3Uri,
        storage: &ObjectStorage,
        payload: &TransformedPayload,
        product: &str,
        instant: DateTime<Utc>,
    ) -> DestinationResult {
        let key = StoragePath::data_key(&uri.key, instant, product, &payload.filename);
        let location = format!("s3://{}/{}", uri.bucket, key);
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match storage.put(&key, payload.bytes.clone()).await {
                Ok(()) => {
                    return DestinationResult {
                        kind: DestinationKind::ObjectStore,
                        location: Some(location),
                        ok: true,
                        error: None,
                        attempts: attempt,
                    }
                }
                Err(e) if attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "Upload failed, retrying");
                    sleep(self.retry.delay_for(attempt)).await;
                }
                Err(e) => {
                    return DestinationResult {
                        kind: DestinationKind::ObjectStore,
                        location: Some(location),
                        ok: false,
                        error: Some(e.to_string()),
                        attempts: attempt,
                    }
                }
            }
        }
    }
}

async fn write_local(
    dir: &Path,
    payload: &TransformedPayload,
    product: &str,
    instant: DateTime<Utc>,
) -> DestinationResult {
    let path = StoragePath::local_file(dir, instant, product, &payload.filename);
    let location = path.display().to_string();

    let written = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &payload.bytes).await
    }
    .await;

    DestinationResult {
        kind: DestinationKind::Local,
        location: Some(location),
        ok: written.is_ok(),
        error: written.err().map(|e| format!("{}: {}", path.display(), e)),
        attempts: 1,
    }
}
