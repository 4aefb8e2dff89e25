//! Upstream radar API access.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use radar_common::time::{epoch_millis, from_epoch_millis};
use radar_common::Product;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Default base URL of the DPC radar API.
pub const DPC_BASE_URL: &str = "https://radar-api.protezionecivile.it/wide/product";

/// Classified upstream failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Network error, timeout, 5xx or unexpected status; worth retrying.
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// The upstream says the resource does not exist.
    #[error("resource not found upstream: {0}")]
    NotFound(String),

    /// The response cannot be used; retrying will not help.
    #[error("invalid upstream response: {0}")]
    Invalid(String),
}

/// A downloaded product file.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Bytes,
    /// Attachment filename announced by the upstream
    pub filename: String,
}

/// Operations the retriever needs from the upstream service.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Lightweight existence check for a product instant.
    async fn exists(&self, product: &str, instant: DateTime<Utc>) -> Result<bool, SourceError>;

    /// Download the file of a product instant into memory.
    async fn download(&self, product: &str, instant: DateTime<Utc>) -> Result<Download, SourceError>;

    /// The upstream's own view of the most recent instant of a product.
    async fn last_available(&self, product: &str) -> Result<Option<DateTime<Utc>>, SourceError>;

    /// Human-readable address of a product instant.
    fn address(&self, product: &Product, instant: DateTime<Utc>) -> String {
        product.render_path(instant)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastProducts {
    #[serde(default)]
    last_products: Vec<LastProduct>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastProduct {
    product_type: String,
    time: i64,
}

/// Client for the Italian Civil Protection Department radar API.
pub struct DpcApi {
    client: Client,
    base_url: String,
}

impl DpcApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Invalid(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    SourceError::Transient(format!("HTTP request failed: {}", e))
}

/// Classify a non-success status.
fn status_error(status: StatusCode, context: &str) -> SourceError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => SourceError::NotFound(format!("{}: HTTP {}", context, status)),
        s if s.is_server_error() => SourceError::Transient(format!("{}: HTTP {}", context, s)),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            SourceError::Transient(format!("{}: HTTP {}", context, status))
        }
        s => SourceError::Transient(format!("{}: unexpected HTTP {}", context, s)),
    }
}

/// Extract the filename from a `Content-Disposition` header value.
pub fn attachment_filename(value: &str) -> Option<String> {
    value.split(';').map(str::trim).find_map(|part| {
        let (key, raw) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let name = raw.trim().trim_matches('"');
        (!name.is_empty()).then(|| name.to_string())
    })
}

async fn read_body(response: Response) -> Result<Bytes, SourceError> {
    let mut body = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SourceError::Transient(format!("Error reading response chunk: {}", e)))?;
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

#[async_trait]
impl UpstreamSource for DpcApi {
    #[instrument(skip(self, product, instant), fields(product = %product, instant = %instant))]
    async fn exists(&self, product: &str, instant: DateTime<Utc>) -> Result<bool, SourceError> {
        let response = self
            .client
            .get(self.url("existsProduct"))
            .query(&[("type", product.to_string()), ("time", epoch_millis(instant).to_string())])
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::OK => response
                .json::<bool>()
                .await
                .map_err(|e| SourceError::Invalid(format!("existsProduct body: {}", e))),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(status_error(status, "existsProduct")),
        }
    }

    #[instrument(skip(self, product, instant), fields(product = %product, instant = %instant))]
    async fn download(&self, product: &str, instant: DateTime<Utc>) -> Result<Download, SourceError> {
        let response = self
            .client
            .post(self.url("downloadProduct"))
            .json(&serde_json::json!({
                "productType": product,
                "productDate": epoch_millis(instant).to_string(),
            }))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "downloadProduct"));
        }

        let filename = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_filename)
            .ok_or_else(|| SourceError::Invalid("missing attachment filename".to_string()))?;

        let bytes = read_body(response).await?;
        if bytes.is_empty() {
            return Err(SourceError::Invalid(format!("empty body for {}", filename)));
        }

        debug!(filename = %filename, size = bytes.len(), "Downloaded product");
        Ok(Download { bytes, filename })
    }

    #[instrument(skip(self, product), fields(product = %product))]
    async fn last_available(&self, product: &str) -> Result<Option<DateTime<Utc>>, SourceError> {
        let response = self
            .client
            .get(self.url("findLastProductByType"))
            .query(&[("type", product)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "findLastProductByType"));
        }

        let body: LastProducts = response
            .json()
            .await
            .map_err(|e| SourceError::Invalid(format!("findLastProductByType body: {}", e)))?;

        Ok(body
            .last_products
            .into_iter()
            .find(|p| p.product_type.eq_ignore_ascii_case(product))
            .and_then(|p| from_epoch_millis(p.time)))
    }

    fn address(&self, product: &Product, instant: DateTime<Utc>) -> String {
        format!("{}?{}", self.url("downloadProduct"), product.render_path(instant))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_attachment_filename() {
        assert_eq!(
            attachment_filename(r#"attachment; filename="SRI_01-07-2025-12-05.tif""#),
            Some("SRI_01-07-2025-12-05.tif".to_string())
        );
        assert_eq!(
            attachment_filename("attachment; filename=LTG.zip"),
            Some("LTG.zip".to_string())
        );
        assert_eq!(attachment_filename("attachment"), None);
        assert_eq!(attachment_filename(r#"attachment; filename="""#), None);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "x"),
            SourceError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "x"),
            SourceError::Transient(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "x"),
            SourceError::Transient(_)
        ));
    }

    #[test]
    fn test_dpc_address() {
        let api = DpcApi::new(format!("{}/", DPC_BASE_URL), Duration::from_secs(5)).unwrap();
        let registry = radar_common::ProductRegistry::builtin();
        let instant = Utc.with_ymd_and_hms(2025, 7, 1, 12, 5, 0).unwrap();
        assert_eq!(
            api.address(registry.lookup("SRI").unwrap(), instant),
            "https://radar-api.protezionecivile.it/wide/product/downloadProduct?type=SRI&time=1751371500000"
        );
    }

    #[test]
    fn test_last_products_body() {
        let body: LastProducts = serde_json::from_str(
            r#"{"lastProducts":[{"productType":"SRI","time":1751371500000,"period":"PT5M"}]}"#,
        )
        .unwrap();
        assert_eq!(body.last_products[0].product_type, "SRI");
        assert_eq!(body.last_products[0].time, 1751371500000);
    }
}
