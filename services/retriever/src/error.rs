//! Error taxonomy of a single retrieval.

use geo_transform::TransformError;
use radar_common::CommonError;
use storage::CatalogError;
use thiserror::Error;

/// Fatal errors of one (product, instant) retrieval.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetrievalError {
    /// Unknown product code.
    #[error("unknown product code: {0}")]
    NotFound(String),

    /// No confirmed data at or near the requested instant.
    #[error("no data available for {product} at {instant}: {detail}")]
    ResourceUnavailable {
        product: String,
        instant: String,
        detail: String,
    },

    /// The requested instant is in the future or outside the coverage window.
    #[error("invalid instant {instant}: {reason}")]
    InvalidInstant { instant: String, reason: String },

    /// Transient failures outlasted the retry policy.
    #[error("fetch failed after {attempts} attempts: {last_error}")]
    FetchFailed { attempts: u32, last_error: String },

    /// The upstream answered with something unusable.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The bounding box does not intersect the payload.
    #[error("{0}")]
    ClipOutOfBounds(String),

    /// Every requested destination failed.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("catalog lock timeout: {0}")]
    CatalogLockTimeout(String),

    /// Payload could not be decoded, reprojected or encoded.
    #[error("transformation failed: {0}")]
    Transform(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    /// The request itself is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RetrievalError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            RetrievalError::NotFound(_) => "not_found",
            RetrievalError::ResourceUnavailable { .. } => "resource_unavailable",
            RetrievalError::InvalidInstant { .. } => "invalid_instant",
            RetrievalError::FetchFailed { .. } => "fetch_failed",
            RetrievalError::InvalidResponse(_) => "invalid_response",
            RetrievalError::UnsupportedFormat(_) => "unsupported_format",
            RetrievalError::ClipOutOfBounds(_) => "clip_out_of_bounds",
            RetrievalError::DeliveryFailed(_) => "delivery_failed",
            RetrievalError::CatalogLockTimeout(_) => "catalog_lock_timeout",
            RetrievalError::Transform(_) => "transform_failed",
            RetrievalError::Catalog(_) => "catalog_failed",
            RetrievalError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl From<TransformError> for RetrievalError {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::UnsupportedFormat(msg) => RetrievalError::UnsupportedFormat(msg),
            e @ TransformError::ClipOutOfBounds { .. } => RetrievalError::ClipOutOfBounds(e.to_string()),
            e => RetrievalError::Transform(e.to_string()),
        }
    }
}

impl From<CatalogError> for RetrievalError {
    fn from(err: CatalogError) -> Self {
        match err {
            e @ CatalogError::LockTimeout { .. } => RetrievalError::CatalogLockTimeout(e.to_string()),
            e => RetrievalError::Catalog(e.to_string()),
        }
    }
}

impl From<CommonError> for RetrievalError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::UnknownProduct(code) => RetrievalError::NotFound(code),
            CommonError::UnsupportedFormat(format) => RetrievalError::UnsupportedFormat(format),
            e => RetrievalError::InvalidRequest(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_transform_errors_keep_their_kind() {
        let clip: RetrievalError = TransformError::out_of_bounds("a", "b").into();
        assert_eq!(clip.kind(), "clip_out_of_bounds");

        let fmt: RetrievalError = TransformError::unsupported("netcdf to geojson").into();
        assert_eq!(fmt, RetrievalError::UnsupportedFormat("netcdf to geojson".to_string()));

        let decode: RetrievalError = TransformError::decode("geotiff", "bad header").into();
        assert_eq!(decode.kind(), "transform_failed");
    }

    #[test]
    fn test_lock_timeout_is_distinct() {
        let err: RetrievalError = CatalogError::LockTimeout {
            lock: PathBuf::from("/tmp/catalog.lock"),
            waited: Duration::from_secs(30),
        }
        .into();
        assert_eq!(err.kind(), "catalog_lock_timeout");
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let err: RetrievalError = CommonError::UnknownProduct("XYZ".to_string()).into();
        assert_eq!(err, RetrievalError::NotFound("XYZ".to_string()));
        assert_eq!(err.to_string(), "unknown product code: XYZ");
    }
}
