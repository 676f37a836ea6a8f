//! Exponential backoff between retried status queries.
//!
//! Only used when transport retries are enabled. Delays start small and
//! double up to a ceiling, which the poller sets to its own interval so a
//! retry never waits longer than a regular poll would.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Growth factor after each consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(15),
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Backoff capped at `interval`, starting at the smaller of 1s and `interval`.
    pub fn capped_at(interval: Duration) -> Self {
        Self {
            initial_delay: Duration::from_secs(1).min(interval),
            max_delay: interval,
            ..Default::default()
        }
    }
}

/// Calculate the next delay from the current one, clamped to `max_delay`.
pub fn next_delay(current: Duration, config: &BackoffConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}
