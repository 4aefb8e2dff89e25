//! Time handling for product instants and cadences.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested instant: an explicit timestamp or the most recent published one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InstantSpec {
    Explicit(DateTime<Utc>),
    Latest,
}

impl InstantSpec {
    pub fn is_latest(&self) -> bool {
        matches!(self, InstantSpec::Latest)
    }
}

/// Parses "latest" (also "now"), or any timestamp accepted by [`parse_iso8601`].
impl FromStr for InstantSpec {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("latest") || trimmed.eq_ignore_ascii_case("now") {
            return Ok(InstantSpec::Latest);
        }
        parse_iso8601(trimmed).map(InstantSpec::Explicit)
    }
}

impl TryFrom<String> for InstantSpec {
    type Error = TimeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InstantSpec> for String {
    fn from(spec: InstantSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for InstantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstantSpec::Explicit(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%SZ")),
            InstantSpec::Latest => write!(f, "latest"),
        }
    }
}

/// Parse an ISO 8601 timestamp. Naive timestamps are taken as UTC.
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    // Full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, pattern) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    // Date only
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Floor a timestamp to the cadence grid anchored at the Unix epoch.
///
/// A zero or negative cadence only drops sub-second precision.
pub fn floor_to_cadence(ts: DateTime<Utc>, cadence: Duration) -> DateTime<Utc> {
    let step = cadence.num_seconds();
    let secs = ts.timestamp();
    let floored = if step > 0 { secs.div_euclid(step) * step } else { secs };
    Utc.timestamp_opt(floored, 0).single().unwrap_or(ts)
}

/// Drop seconds and sub-seconds.
pub fn truncate_to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    floor_to_cadence(ts, Duration::minutes(1))
}

/// Milliseconds since the Unix epoch, as used by the upstream API.
pub fn epoch_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Inverse of [`epoch_millis`].
pub fn from_epoch_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Hive-style partition for a product instant: `year=2025/month=7/day=1/product=SRI`.
pub fn hive_partition(ts: DateTime<Utc>, product_code: &str) -> String {
    format!(
        "year={}/month={}/day={}/product={}",
        ts.year(),
        ts.month(),
        ts.day(),
        product_code
    )
}

/// Compact stamp used in output filenames: `202507011205`.
pub fn filename_stamp(ts: DateTime<Utc>) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}",
        ts.year(),
        ts.month(),
        ts.day(),
        ts.hour(),
        ts.minute()
    )
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        parse_iso8601(s).unwrap()
    }

    #[test]
    fn test_parse_instant_spec() {
        assert_eq!("latest".parse::<InstantSpec>().unwrap(), InstantSpec::Latest);
        assert_eq!("LATEST".parse::<InstantSpec>().unwrap(), InstantSpec::Latest);
        assert_eq!(
            "2025-07-01T12:07:00Z".parse::<InstantSpec>().unwrap(),
            InstantSpec::Explicit(ts("2025-07-01T12:07:00"))
        );
        assert!("yesterday".parse::<InstantSpec>().is_err());
    }

    #[test]
    fn test_floor_to_cadence() {
        let t = ts("2025-07-01T12:07:42Z");
        assert_eq!(floor_to_cadence(t, Duration::minutes(5)), ts("2025-07-01T12:05:00Z"));
        assert_eq!(floor_to_cadence(t, Duration::minutes(20)), ts("2025-07-01T12:00:00Z"));
        assert_eq!(floor_to_cadence(t, Duration::hours(1)), ts("2025-07-01T12:00:00Z"));
        assert_eq!(truncate_to_minute(t), ts("2025-07-01T12:07:00Z"));
    }

    #[test]
    fn test_hive_partition_is_unpadded() {
        let t = ts("2025-07-01T12:05:00Z");
        assert_eq!(hive_partition(t, "SRI"), "year=2025/month=7/day=1/product=SRI");
        assert_eq!(filename_stamp(t), "202507011205");
    }

    #[test]
    fn test_epoch_millis_roundtrip() {
        let t = ts("2025-07-01T12:05:00Z");
        assert_eq!(epoch_millis(t), 1_751_371_500_000);
        assert_eq!(from_epoch_millis(1_751_371_500_000), Some(t));
    }
}
