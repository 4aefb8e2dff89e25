//! Immutable description of one retrieval.

use geo_transform::TransformOptions;
use radar_common::{InstantSpec, RetryPolicy};
use std::path::PathBuf;
use storage::{CatalogLocation, S3Uri, StoragePath};

use crate::error::RetrievalError;

/// Where the delivered payload goes and whether it is catalogued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryOptions {
    /// Hand the bytes back to the caller
    pub return_data: bool,
    pub out_dir: Option<PathBuf>,
    /// `s3://bucket/prefix`
    pub object_store: Option<S3Uri>,
    pub register_catalog: bool,
    /// Overrides the default catalog location
    pub catalog: Option<CatalogLocation>,
}

impl DeliveryOptions {
    pub fn has_destination(&self) -> bool {
        self.return_data || self.out_dir.is_some() || self.object_store.is_some()
    }

    /// Catalog to register into: the explicit one, else `catalog/catalog.jsonl`
    /// under the object-store prefix, else `catalog.jsonl` in the output dir.
    /// `None` when only in-memory delivery was requested.
    pub fn catalog_location(&self) -> Option<CatalogLocation> {
        if let Some(location) = &self.catalog {
            return Some(location.clone());
        }
        if let Some(uri) = &self.object_store {
            return Some(CatalogLocation::Remote(S3Uri {
                bucket: uri.bucket.clone(),
                key: uri.join(StoragePath::catalog_key()),
            }));
        }
        self.out_dir
            .as_ref()
            .map(|dir| CatalogLocation::Local(dir.join("catalog.jsonl")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub product: String,
    pub instant: InstantSpec,
    pub options: TransformOptions,
    pub delivery: DeliveryOptions,
    pub retry: RetryPolicy,
    /// Progress-tracking id; generated when absent
    pub job_id: Option<String>,
}

impl RetrievalRequest {
    pub fn new(product: impl Into<String>, instant: InstantSpec) -> Self {
        Self {
            product: product.into(),
            instant,
            options: TransformOptions::default(),
            delivery: DeliveryOptions::default(),
            retry: RetryPolicy::default(),
            job_id: None,
        }
    }

    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryOptions) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Reject requests that cannot succeed whatever the upstream does.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.product.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest("empty product code".to_string()));
        }
        if let Some(bbox) = &self.options.bbox {
            if !(bbox.min_x < bbox.max_x && bbox.min_y < bbox.max_y) {
                return Err(RetrievalError::InvalidRequest(format!(
                    "degenerate bounding box {}",
                    bbox
                )));
            }
        }
        if !self.delivery.has_destination() {
            return Err(RetrievalError::InvalidRequest(
                "no delivery destination requested".to_string(),
            ));
        }
        Ok(())
    }
}
