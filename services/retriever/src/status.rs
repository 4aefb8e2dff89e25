//! Read-only availability report. Probes the upstream, never downloads and
//! never touches the catalog.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use radar_common::{DataFormat, Product, ProductRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::RetrievalError;
use crate::resolve::Resolver;
use crate::source::UpstreamSource;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductStatus {
    pub product: String,
    pub name: String,
    /// Latest confirmed instant; `None` when unknown
    pub latest: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cadence_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormat>,
    /// The upstream's own "last product" instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_latest: Option<DateTime<Utc>>,
}

pub struct StatusReporter {
    registry: Arc<ProductRegistry>,
    resolver: Resolver,
    source: Arc<dyn UpstreamSource>,
}

impl StatusReporter {
    pub fn new(registry: Arc<ProductRegistry>, source: Arc<dyn UpstreamSource>) -> Self {
        Self {
            registry,
            resolver: Resolver::new(source.clone()),
            source,
        }
    }

    pub fn with_probe_steps(mut self, steps: u32) -> Self {
        self.resolver = self.resolver.with_probe_steps(steps);
        self
    }

    pub async fn status(
        &self,
        product: Option<&str>,
        verbose: bool,
    ) -> Result<Vec<ProductStatus>, RetrievalError> {
        self.status_at(product, verbose, Utc::now()).await
    }

    /// Status of one product, or of every registered product.
    pub async fn status_at(
        &self,
        product: Option<&str>,
        verbose: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProductStatus>, RetrievalError> {
        let products: Vec<&Product> = match product {
            Some(code) => vec![self.registry.lookup(code)?],
            None => self.registry.list().iter().collect(),
        };

        Ok(join_all(products.into_iter().map(|p| self.product_status(p, verbose, now))).await)
    }

    async fn product_status(&self, product: &Product, verbose: bool, now: DateTime<Utc>) -> ProductStatus {
        let latest = match self.resolver.probe_latest(product, now).await {
            Ok(instant) => Some(instant),
            Err(e) => {
                debug!(product = %product.code, error = %e, "Latest instant unknown");
                None
            }
        };

        let mut status = ProductStatus {
            product: product.code.clone(),
            name: product.name.clone(),
            latest,
            description: None,
            cadence_minutes: None,
            format: None,
            upstream_latest: None,
        };

        if verbose {
            status.description = Some(product.description.clone());
            status.cadence_minutes = product.cadence_minutes;
            status.format = Some(product.native_format);
            status.upstream_latest = match self.source.last_available(&product.code).await {
                Ok(instant) => instant,
                Err(e) => {
                    warn!(product = %product.code, error = %e, "Upstream last product lookup failed");
                    None
                }
            };
        }

        status
    }
}
