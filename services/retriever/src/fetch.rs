//! Download of a resolved resource with bounded, fixed-delay retry.

use geo_transform::RawPayload;
use radar_common::{DataFormat, Product, RetryPolicy};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::error::RetrievalError;
use crate::resolve::ResolvedResource;
use crate::source::{SourceError, UpstreamSource};

/// A successful fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub payload: RawPayload,
    pub attempts: u32,
}

/// A failed fetch, with the number of attempts it consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub error: RetrievalError,
    pub attempts: u32,
}

#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn UpstreamSource>,
}

impl Fetcher {
    pub fn new(source: Arc<dyn UpstreamSource>) -> Self {
        Self { source }
    }

    /// Download `resolved`, retrying transient failures only.
    ///
    /// Not-found and malformed responses end the fetch at once without
    /// consuming the remaining retry budget.
    #[instrument(skip(self, resolved, product, policy), fields(product = %resolved.product, instant = %resolved.instant))]
    pub async fn fetch(
        &self,
        resolved: &ResolvedResource,
        product: &Product,
        policy: &RetryPolicy,
    ) -> Result<Fetched, FetchFailure> {
        let max_attempts = policy.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.source.download(&resolved.product, resolved.instant).await {
                Ok(download) => {
                    let format = DataFormat::from_filename(&download.filename)
                        .unwrap_or(product.native_format);
                    info!(
                        filename = %download.filename,
                        size = download.bytes.len(),
                        format = %format,
                        attempts = attempt,
                        "Fetched product"
                    );
                    return Ok(Fetched {
                        payload: RawPayload {
                            bytes: download.bytes,
                            format,
                            filename: download.filename,
                        },
                        attempts: attempt,
                    });
                }
                Err(SourceError::Transient(msg)) if attempt < max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        error = %msg,
                        "Download failed, retrying in {:?}",
                        delay
                    );
                    sleep(delay).await;
                }
                Err(SourceError::Transient(msg)) => {
                    warn!(attempts = attempt, error = %msg, "Download failed, retries exhausted");
                    return Err(FetchFailure {
                        error: RetrievalError::FetchFailed {
                            attempts: attempt,
                            last_error: msg,
                        },
                        attempts: attempt,
                    });
                }
                Err(SourceError::NotFound(msg)) => {
                    return Err(FetchFailure {
                        error: RetrievalError::ResourceUnavailable {
                            product: resolved.product.clone(),
                            instant: resolved.instant.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                            detail: msg,
                        },
                        attempts: attempt,
                    });
                }
                Err(SourceError::Invalid(msg)) => {
                    return Err(FetchFailure {
                        error: RetrievalError::InvalidResponse(msg),
                        attempts: attempt,
                    });
                }
            }
        }
    }
}
