//! Outcome reporting to an external progress-tracking backend.

use reqwest::Client;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::outcome::DeliveryOutcome;

pub struct ProgressReporter {
    client: Client,
    url: String,
}

impl ProgressReporter {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// POST `{"jid": ..., "outcome": ...}`. Failures are logged and swallowed.
    pub async fn report(&self, outcome: &DeliveryOutcome) -> bool {
        match self
            .client
            .post(&self.url)
            .json(&payload(outcome))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(jid = %outcome.job_id, "Outcome reported");
                true
            }
            Ok(response) => {
                warn!(
                    jid = %outcome.job_id,
                    status = %response.status(),
                    "Progress backend rejected outcome"
                );
                false
            }
            Err(e) => {
                error!(jid = %outcome.job_id, error = %e, "Failed to call progress backend");
                false
            }
        }
    }
}

fn payload(outcome: &DeliveryOutcome) -> serde_json::Value {
    serde_json::json!({
        "jid": outcome.job_id,
        "outcome": outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_common::InstantSpec;

    #[test]
    fn test_payload_shape() {
        let outcome = DeliveryOutcome::new("job-7", "VMI", InstantSpec::Latest);
        let body = payload(&outcome);
        assert_eq!(body["jid"], "job-7");
        assert_eq!(body["outcome"]["product"], "VMI");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_not_fatal() {
        // Nothing listens on the discard port
        let reporter = ProgressReporter::new("http://127.0.0.1:9/progress").unwrap();
        let outcome = DeliveryOutcome::new("job-8", "SRI", InstantSpec::Latest);
        assert!(!reporter.report(&outcome).await);
    }
}
