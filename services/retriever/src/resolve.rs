//! Resolution of a requested instant to a concrete upstream resource.

use chrono::{DateTime, Utc};
use radar_common::time::{epoch_millis, truncate_to_minute};
use radar_common::{floor_to_cadence, InstantSpec, Product};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::RetrievalError;
use crate::source::UpstreamSource;

/// Default number of cadence steps probed backward for `latest`.
pub const DEFAULT_PROBE_STEPS: u32 = 12;

/// A product instant pinned to an upstream resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedResource {
    pub product: String,
    /// Upstream address of the resource
    pub address: String,
    /// Never "latest"
    pub instant: DateTime<Utc>,
    pub epoch_ms: i64,
}

/// Maps an [`InstantSpec`] to a [`ResolvedResource`].
#[derive(Clone)]
pub struct Resolver {
    source: Arc<dyn UpstreamSource>,
    max_probe_steps: u32,
}

impl Resolver {
    pub fn new(source: Arc<dyn UpstreamSource>) -> Self {
        Self {
            source,
            max_probe_steps: DEFAULT_PROBE_STEPS,
        }
    }

    /// At least one step is always probed.
    pub fn with_probe_steps(mut self, steps: u32) -> Self {
        self.max_probe_steps = steps.max(1);
        self
    }

    pub fn max_probe_steps(&self) -> u32 {
        self.max_probe_steps
    }

    pub async fn resolve(
        &self,
        product: &Product,
        spec: InstantSpec,
    ) -> Result<ResolvedResource, RetrievalError> {
        self.resolve_at(product, spec, Utc::now()).await
    }

    /// Resolve against an explicit evaluation time.
    #[instrument(skip(self, product, spec), fields(product = %product.code, spec = %spec))]
    pub async fn resolve_at(
        &self,
        product: &Product,
        spec: InstantSpec,
        now: DateTime<Utc>,
    ) -> Result<ResolvedResource, RetrievalError> {
        let instant = match spec {
            InstantSpec::Explicit(ts) => normalize_explicit(product, ts, now)?,
            InstantSpec::Latest => self.probe_latest(product, now).await?,
        };

        Ok(ResolvedResource {
            product: product.code.clone(),
            address: self.source.address(product, instant),
            instant,
            epoch_ms: epoch_millis(instant),
        })
    }

    /// Most recent confirmed instant at or before `now - publish_delay`.
    ///
    /// Probe errors are logged and treated as "not there" for that step.
    pub async fn probe_latest(
        &self,
        product: &Product,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, RetrievalError> {
        let reference = now - product.publish_delay();
        let (candidate, step, steps) = match product.cadence() {
            Some(cadence) => (floor_to_cadence(reference, cadence), cadence, self.max_probe_steps),
            None => (truncate_to_minute(reference), chrono::Duration::zero(), 1),
        };

        for i in 0..steps {
            let instant = candidate - step * i as i32;
            match self.source.exists(&product.code, instant).await {
                Ok(true) => {
                    info!(instant = %instant, steps_back = i, "Confirmed latest instant");
                    return Ok(instant);
                }
                Ok(false) => debug!(instant = %instant, "Not published"),
                Err(e) => warn!(instant = %instant, error = %e, "Existence probe failed"),
            }
        }

        Err(RetrievalError::ResourceUnavailable {
            product: product.code.clone(),
            instant: "latest".to_string(),
            detail: format!(
                "nothing confirmed in {} probe(s) back from {}",
                steps,
                candidate.format("%Y-%m-%dT%H:%M:%SZ")
            ),
        })
    }
}

/// Snap an explicit instant to the product grid and check it is retrievable.
pub fn normalize_explicit(
    product: &Product,
    ts: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, RetrievalError> {
    let invalid = |reason: String| RetrievalError::InvalidInstant {
        instant: ts.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        reason,
    };

    if ts > now {
        return Err(invalid("instant is in the future".to_string()));
    }

    let normalized = match product.cadence() {
        Some(cadence) => floor_to_cadence(ts, cadence),
        None => truncate_to_minute(ts),
    };

    if now - normalized > product.coverage() {
        return Err(invalid(format!(
            "older than the {} h coverage window of {}",
            product.coverage().num_hours(),
            product.code
        )));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::FakeSource;
    use chrono::{Duration, TimeZone};
    use radar_common::ProductRegistry;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, h, m, s).unwrap()
    }

    fn product(code: &str) -> Product {
        ProductRegistry::builtin().lookup(code).unwrap().clone()
    }

    #[tokio::test]
    async fn test_explicit_is_floored_and_deterministic() {
        let source = Arc::new(FakeSource::new());
        let resolver = Resolver::new(source.clone());
        let sri = product("SRI");
        let spec = InstantSpec::Explicit(at(12, 7, 42));

        let a = resolver.resolve_at(&sri, spec, at(13, 0, 0)).await.unwrap();
        let b = resolver.resolve_at(&sri, spec, at(13, 0, 0)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.instant, at(12, 5, 0));
        assert_eq!(a.epoch_ms, 1751371500000);
        assert_eq!(a.address, "type=SRI&time=1751371500000");
        assert_eq!(source.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_explicit_hourly_and_snapshot() {
        let resolver = Resolver::new(Arc::new(FakeSource::new()));
        let now = at(13, 0, 0);

        let srt3 = resolver
            .resolve_at(&product("SRT3"), InstantSpec::Explicit(at(12, 59, 0)), now)
            .await
            .unwrap();
        assert_eq!(srt3.instant, at(12, 0, 0));

        let status = resolver
            .resolve_at(&product("RADAR_STATUS"), InstantSpec::Explicit(at(12, 7, 42)), now)
            .await
            .unwrap();
        assert_eq!(status.instant, at(12, 7, 0));
    }

    #[tokio::test]
    async fn test_explicit_rejects_future_and_expired() {
        let resolver = Resolver::new(Arc::new(FakeSource::new()));
        let sri = product("SRI");
        let now = at(12, 0, 0);

        let future = resolver
            .resolve_at(&sri, InstantSpec::Explicit(now + Duration::minutes(5)), now)
            .await;
        assert!(matches!(future, Err(RetrievalError::InvalidInstant { .. })));

        let old = resolver
            .resolve_at(&sri, InstantSpec::Explicit(now - Duration::days(8)), now)
            .await;
        assert!(matches!(old, Err(RetrievalError::InvalidInstant { .. })));

        let edge = resolver
            .resolve_at(&sri, InstantSpec::Explicit(now - Duration::days(7)), now)
            .await;
        tokio_test::assert_ok!(edge);
    }

    #[tokio::test]
    async fn test_latest_walks_back_to_confirmed_instant() {
        let source = Arc::new(FakeSource::new().with_available("SRI", at(11, 50, 0)));
        let resolver = Resolver::new(source.clone());
        let now = at(12, 3, 20);

        let resolved = resolver
            .resolve_at(&product("SRI"), InstantSpec::Latest, now)
            .await
            .unwrap();
        assert_eq!(resolved.instant, at(11, 50, 0));
        assert!(resolved.instant <= now);
        // 12:00, 11:55, 11:50
        assert_eq!(source.probe_count(), 3);
    }

    #[tokio::test]
    async fn test_latest_probe_errors_do_not_confirm() {
        let source = Arc::new(
            FakeSource::new()
                .with_available("SRI", at(12, 0, 0))
                .with_available("SRI", at(11, 55, 0))
                .with_probe_error(at(12, 0, 0)),
        );
        let resolver = Resolver::new(source);

        let resolved = resolver
            .resolve_at(&product("SRI"), InstantSpec::Latest, at(12, 1, 0))
            .await
            .unwrap();
        assert_eq!(resolved.instant, at(11, 55, 0));
    }

    #[tokio::test]
    async fn test_latest_honors_publish_delay() {
        let mut sri = product("SRI");
        sri.publish_delay_minutes = 10;
        let source = Arc::new(FakeSource::new().with_available("SRI", at(11, 50, 0)));
        let resolver = Resolver::new(source.clone());

        let resolved = resolver
            .resolve_at(&sri, InstantSpec::Latest, at(12, 3, 0))
            .await
            .unwrap();
        assert_eq!(resolved.instant, at(11, 50, 0));
        assert_eq!(source.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_latest_exhausts_probe_budget() {
        let source = Arc::new(FakeSource::new());
        let resolver = Resolver::new(source.clone()).with_probe_steps(4);

        let result = resolver
            .resolve_at(&product("SRI"), InstantSpec::Latest, at(12, 0, 0))
            .await;
        assert_eq!(result.unwrap_err().kind(), "resource_unavailable");
        assert_eq!(source.probe_count(), 4);
    }

    #[tokio::test]
    async fn test_latest_snapshot_probes_once() {
        let source = Arc::new(FakeSource::new());
        let resolver = Resolver::new(source.clone());

        let result = resolver
            .resolve_at(&product("RADAR_STATUS"), InstantSpec::Latest, at(12, 3, 30))
            .await;
        assert!(result.is_err());
        assert_eq!(source.probe_count(), 1);
    }
}
