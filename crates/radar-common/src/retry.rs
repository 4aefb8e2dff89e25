//! Bounded retry policy shared by fetches and uploads.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed-delay retry policy.
///
/// An operation runs at most `max_retry + 1` times, sleeping `retry_delay`
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retry: u32,
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry: 3,
            retry_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retry: u32, retry_delay: Duration) -> Self {
        Self {
            max_retry,
            retry_delay,
        }
    }

    /// Single attempt, no sleeping.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total number of attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_retry.saturating_add(1)
    }

    /// Delay to sleep after the given failed attempt (1-based). Fixed, not exponential.
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.retry_delay
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
