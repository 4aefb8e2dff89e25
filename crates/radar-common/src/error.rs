//! Error types shared by the radar retriever crates.

use thiserror::Error;

use crate::{BboxParseError, CrsParseError, TimeParseError};

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised by the shared types: registry lookups, parsing and config loading.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Unknown product code: {0}")]
    UnknownProduct(String),

    #[error("Invalid BBOX: {0}")]
    InvalidBbox(#[from] BboxParseError),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(#[from] CrsParseError),

    #[error("Invalid time specification: {0}")]
    InvalidTime(#[from] TimeParseError),

    #[error("Unsupported data format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        CommonError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for CommonError {
    fn from(err: serde_yaml::Error) -> Self {
        CommonError::Config(format!("YAML error: {}", err))
    }
}
