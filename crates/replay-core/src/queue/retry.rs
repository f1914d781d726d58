//! Retry policy: retry budget and backoff delays.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Exponential backoff with a ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Ceiling for any single delay.
    pub max_delay: Duration,

    /// Failed attempts after which a mutation is failed permanently.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Backoff after `retry_count` failed attempts:
    /// `min(base_delay * 2^(retry_count - 1), max_delay)`.
    ///
    /// With the defaults: 1s, 2s, 4s, 8s, 16s, 32s, then capped at 60s.
    /// A record that never failed has no delay.
    pub fn delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry_count - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Time still to wait before a record is due again, `ZERO` if it is due.
    pub fn remaining(
        &self,
        retry_count: u32,
        last_attempt_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Duration {
        let Some(last_attempt_at) = last_attempt_at else {
            return Duration::ZERO;
        };
        let elapsed = (now - last_attempt_at).to_std().unwrap_or(Duration::ZERO);
        self.delay(retry_count).saturating_sub(elapsed)
    }

    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}
