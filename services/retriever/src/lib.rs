//! Weather radar product retriever.
//!
//! A retrieval runs as a sequence of steps for one (product, instant) pair:
//! - resolve the requested instant against the upstream ([`resolve`])
//! - download it with bounded fixed-delay retry ([`fetch`])
//! - clip, reproject and re-encode it (`geo-transform`)
//! - deliver it to local disk, memory and/or object storage ([`sink`])
//! - register it in the shared catalog (`storage`)
//!
//! [`pipeline::Pipeline`] ties the steps together and always yields a
//! [`outcome::DeliveryOutcome`]. [`status::StatusReporter`] is a separate
//! read-only path.

pub mod config;
pub mod error;
pub mod fetch;
pub mod outcome;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod resolve;
pub mod sink;
pub mod source;
pub mod status;

pub use config::RetrieverConfig;
pub use error::RetrievalError;
pub use outcome::{CatalogStatus, DeliveryOutcome};
pub use pipeline::{Pipeline, StoreProvider};
pub use request::{DeliveryOptions, RetrievalRequest};
pub use resolve::{ResolvedResource, Resolver};
pub use source::{DpcApi, UpstreamSource};
pub use status::{ProductStatus, StatusReporter};
