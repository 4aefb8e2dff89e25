//! Caller-facing summary of a retrieval.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use radar_common::{DataFormat, InstantSpec};
use serde::Serialize;
use storage::Registration;

use crate::error::RetrievalError;
use crate::sink::DestinationResult;

/// Typed error as exposed in outcomes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeError {
    pub kind: String,
    pub detail: String,
}

impl From<&RetrievalError> for OutcomeError {
    fn from(err: &RetrievalError) -> Self {
        Self {
            kind: err.kind().to_string(),
            detail: err.to_string(),
        }
    }
}

/// What happened to catalog registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CatalogStatus {
    Registered,
    AlreadyPresent,
    /// Not requested, or nothing was persisted
    Skipped,
    /// Delivery still counts as successful
    Failed(OutcomeError),
}

impl From<Registration> for CatalogStatus {
    fn from(registration: Registration) -> Self {
        match registration {
            Registration::Registered => CatalogStatus::Registered,
            Registration::AlreadyPresent => CatalogStatus::AlreadyPresent,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub job_id: String,
    pub product: String,
    pub requested: InstantSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_instant: Option<DateTime<Utc>>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormat>,
    pub destinations: Vec<DestinationResult>,
    pub fetch_attempts: u32,
    pub catalog: CatalogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
    /// Payload bytes for in-memory delivery
    #[serde(skip)]
    pub data: Option<Bytes>,
}

impl DeliveryOutcome {
    /// A pending outcome, not yet successful.
    pub fn new(job_id: impl Into<String>, product: impl Into<String>, requested: InstantSpec) -> Self {
        Self {
            job_id: job_id.into(),
            product: product.into(),
            requested,
            resolved_instant: None,
            success: false,
            filename: None,
            format: None,
            destinations: Vec::new(),
            fetch_attempts: 0,
            catalog: CatalogStatus::Skipped,
            error: None,
            data: None,
        }
    }

    pub fn fail(&mut self, err: &RetrievalError) {
        self.success = false;
        self.error = Some(err.into());
    }

    /// Locations that received the payload.
    pub fn delivered_locations(&self) -> Vec<&str> {
        self.destinations
            .iter()
            .filter(|d| d.ok)
            .filter_map(|d| d.location.as_deref())
            .collect()
    }
}
