//! Exponential backoff settings for retried API calls.

use std::time::Duration;

/// Retry behaviour for [`safe_api_call_with_retries`](crate::http::apicall::safe_api_call_with_retries).
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Extra attempts after the first one (default 3, so up to 4 calls).
    pub retries: usize,
    /// Delay before the first retry (default 100ms).
    pub initial_delay: Duration,
    /// Multiplier applied after every retry (default 2.0).
    pub factor: f64,
    /// Upper bound for a single delay (default 30s).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_delay: Duration::from_millis(100),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            retries: 0,
            ..Default::default()
        }
    }

    pub fn total_attempts(&self) -> usize {
        self.retries.saturating_add(1)
    }
}

/// Delay to wait after failed attempt number `retry` (0-based):
/// `initial_delay * factor^retry`, capped at `max_delay`.
pub fn calculate_backoff(retry: usize, config: &RetryConfig) -> Duration {
    let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
    let scaled = config.initial_delay.as_nanos() as f64 * config.factor.max(0.0).powi(exponent);
    if !scaled.is_finite() || scaled >= config.max_delay.as_nanos() as f64 {
        return config.max_delay;
    }
    Duration::from_nanos(scaled.round() as u64)
}

/// Whether another attempt is allowed after `attempts` calls.
pub fn should_retry(attempts: usize, config: &RetryConfig) -> bool {
    attempts < config.total_attempts()
}
