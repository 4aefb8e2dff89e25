//! Orchestration of one retrieval: resolve, fetch, transform, deliver, catalog.

use chrono::{DateTime, Utc};
use geo_transform::{RawPayload, TransformedPayload, Transformer};
use radar_common::{Product, ProductRegistry};
use std::sync::Arc;
use std::time::Duration;
use storage::{
    Catalog, CatalogEntry, CatalogLocation, ObjectStorage, ObjectStorageConfig, StorageError,
    DEFAULT_LOCK_TIMEOUT,
};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::RetrievalError;
use crate::fetch::Fetcher;
use crate::outcome::{CatalogStatus, DeliveryOutcome, OutcomeError};
use crate::request::{DeliveryOptions, RetrievalRequest};
use crate::resolve::Resolver;
use crate::sink::{DeliveryReport, Destination, SinkDispatcher};
use crate::source::UpstreamSource;

/// Hands out object-store clients per bucket.
#[derive(Debug, Clone)]
pub enum StoreProvider {
    /// S3 client built from the environment for each bucket
    S3(ObjectStorageConfig),
    /// A single pre-built store, whatever the bucket
    Fixed(ObjectStorage),
}

impl StoreProvider {
    pub fn storage_for(&self, bucket: &str) -> Result<ObjectStorage, StorageError> {
        match self {
            StoreProvider::S3(config) => ObjectStorage::new(bucket, config),
            StoreProvider::Fixed(storage) => Ok(storage.clone()),
        }
    }
}

/// Runs [`RetrievalRequest`]s against one upstream.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<ProductRegistry>,
    resolver: Resolver,
    fetcher: Fetcher,
    transformer: Arc<Transformer>,
    stores: StoreProvider,
    lock_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        registry: Arc<ProductRegistry>,
        source: Arc<dyn UpstreamSource>,
        transformer: Transformer,
        stores: StoreProvider,
    ) -> Self {
        Self {
            registry,
            resolver: Resolver::new(source.clone()),
            fetcher: Fetcher::new(source),
            transformer: Arc::new(transformer),
            stores,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_probe_steps(mut self, steps: u32) -> Self {
        self.resolver = self.resolver.with_probe_steps(steps);
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Run one request. Failures are reported in the outcome, never raised.
    pub async fn run(&self, request: &RetrievalRequest) -> DeliveryOutcome {
        let job_id = request
            .job_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let mut outcome = DeliveryOutcome::new(&job_id, &request.product, request.instant);

        let span = info_span!("retrieval", job_id = %job_id, product = %request.product, time = %request.instant);
        async {
            match self.execute(request, &mut outcome).await {
                Ok(()) => info!(
                    resolved = ?outcome.resolved_instant,
                    catalog = ?outcome.catalog,
                    "Retrieval complete"
                ),
                Err(e) => {
                    error!(kind = e.kind(), error = %e, "Retrieval failed");
                    outcome.fail(&e);
                }
            }
        }
        .instrument(span)
        .await;

        outcome
    }

    async fn execute(
        &self,
        request: &RetrievalRequest,
        outcome: &mut DeliveryOutcome,
    ) -> Result<(), RetrievalError> {
        request.validate()?;
        let product = self.registry.lookup(&request.product)?.clone();
        outcome.product = product.code.clone();
        let destinations = self.destinations(&request.delivery)?;

        let resolved = self.resolver.resolve(&product, request.instant).await?;
        outcome.resolved_instant = Some(resolved.instant);

        let fetched = match self.fetcher.fetch(&resolved, &product, &request.retry).await {
            Ok(fetched) => fetched,
            Err(failure) => {
                outcome.fetch_attempts = failure.attempts;
                return Err(failure.error);
            }
        };
        outcome.fetch_attempts = fetched.attempts;

        let payload = self.transform(fetched.payload, &product, resolved.instant, request).await?;
        outcome.filename = Some(payload.filename.clone());
        outcome.format = Some(payload.format);

        let report = SinkDispatcher::new(request.retry)
            .deliver(&payload, &product.code, resolved.instant, &destinations)
            .await;
        outcome.destinations = report.results.clone();
        outcome.data = report.bytes.clone();

        if !report.any_ok() {
            let detail = report
                .failures()
                .map(|r| format!("{}: {}", r.kind, r.error.as_deref().unwrap_or("unknown error")))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RetrievalError::DeliveryFailed(detail));
        }
        outcome.success = true;

        if request.delivery.register_catalog {
            outcome.catalog = self.register(&request.delivery, &product, &resolved.instant, &report).await;
        }
        Ok(())
    }

    /// Decoding and reprojection are CPU bound, keep them off the runtime threads.
    async fn transform(
        &self,
        raw: RawPayload,
        product: &Product,
        instant: DateTime<Utc>,
        request: &RetrievalRequest,
    ) -> Result<TransformedPayload, RetrievalError> {
        let transformer = self.transformer.clone();
        let product = product.clone();
        let options = request.options;

        tokio::task::spawn_blocking(move || transformer.transform(raw, &product, instant, &options))
            .await
            .map_err(|e| RetrievalError::Transform(format!("transform task failed: {}", e)))?
            .map_err(RetrievalError::from)
    }

    fn destinations(&self, delivery: &DeliveryOptions) -> Result<Vec<Destination>, RetrievalError> {
        let mut destinations = Vec::new();
        if let Some(dir) = &delivery.out_dir {
            destinations.push(Destination::Local(dir.clone()));
        }
        if delivery.return_data {
            destinations.push(Destination::Bytes);
        }
        if let Some(uri) = &delivery.object_store {
            let storage = self.stores.storage_for(&uri.bucket).map_err(|e| {
                RetrievalError::InvalidRequest(format!("object store {}: {}", uri, e))
            })?;
            destinations.push(Destination::ObjectStore {
                uri: uri.clone(),
                storage,
            });
        }
        Ok(destinations)
    }

    async fn register(
        &self,
        delivery: &DeliveryOptions,
        product: &Product,
        instant: &DateTime<Utc>,
        report: &DeliveryReport,
    ) -> CatalogStatus {
        let locations = report.persisted_locations();
        let Some(location) = delivery.catalog_location() else {
            info!("Only in-memory delivery, catalog registration skipped");
            return CatalogStatus::Skipped;
        };
        if locations.is_empty() {
            info!("Nothing persisted, catalog registration skipped");
            return CatalogStatus::Skipped;
        }

        let catalog = match &location {
            CatalogLocation::Local(path) => Catalog::local(path),
            CatalogLocation::Remote(uri) => match self.stores.storage_for(&uri.bucket) {
                Ok(storage) => Catalog::remote(uri.clone(), storage),
                Err(e) => {
                    let err = RetrievalError::Catalog(e.to_string());
                    warn!(catalog = %location, error = %err, "Catalog unreachable");
                    return CatalogStatus::Failed(OutcomeError::from(&err));
                }
            },
        }
        .with_lock_timeout(self.lock_timeout);

        match catalog
            .register(CatalogEntry::new(&product.code, *instant, locations))
            .await
        {
            Ok(registration) => registration.into(),
            Err(e) => {
                let err = RetrievalError::from(e);
                warn!(catalog = %location, kind = err.kind(), error = %err, "Catalog registration failed");
                CatalogStatus::Failed(OutcomeError::from(&err))
            }
        }
    }
}
