//! Common types shared across the radar retriever crates and services.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod format;
pub mod product;
pub mod retry;
pub mod time;

pub use bbox::{BboxParseError, BoundingBox};
pub use crs::{CrsCode, CrsParseError};
pub use error::{CommonError, CommonResult};
pub use format::DataFormat;
pub use product::{Product, ProductRegistry, ValueKind};
pub use retry::RetryPolicy;
pub use time::{floor_to_cadence, hive_partition, InstantSpec, TimeParseError};
