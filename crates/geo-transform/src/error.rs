//! Error types for payload transformation.

use thiserror::Error;

/// Errors that can occur while transforming a payload.
#[derive(Error, Debug)]
pub enum TransformError {
    /// The requested conversion is not possible for this payload.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The bounding box does not overlap the payload extent at all.
    #[error("bounding box {bbox} does not intersect payload extent {extent}")]
    ClipOutOfBounds { bbox: String, extent: String },

    /// The payload bytes could not be parsed.
    #[error("failed to decode {format}: {message}")]
    Decode { format: String, message: String },

    /// The result could not be serialized.
    #[error("failed to encode {format}: {message}")]
    Encode { format: String, message: String },

    /// Coordinates could not be transformed.
    #[error("projection error: {0}")]
    Projection(#[from] projection::ProjectionError),

    /// Invalid resampling configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TransformError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn out_of_bounds(bbox: impl ToString, extent: impl ToString) -> Self {
        Self::ClipOutOfBounds {
            bbox: bbox.to_string(),
            extent: extent.to_string(),
        }
    }

    pub fn decode(format: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            format: format.into(),
            message: message.to_string(),
        }
    }

    pub fn encode(format: impl Into<String>, message: impl ToString) -> Self {
        Self::Encode {
            format: format.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for transformation operations.
pub type Result<T> = std::result::Result<T, TransformError>;
