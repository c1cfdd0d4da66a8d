//! Exponential backoff with jitter for sync retries

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts before an entry is retired as permanently failed
    pub max_retries: u32,

    /// Backoff base delay (milliseconds)
    pub base_delay_ms: u64,

    /// Backoff cap (milliseconds)
    pub max_delay_ms: u64,

    /// Growth factor per attempt
    pub backoff_multiplier: f64,

    /// Jitter fraction applied to the computed delay
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000, // 30 seconds
            backoff_multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

/// Retry policy derived from configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create policy from configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Policy with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Whether an entry with this many attempts is out of budget
    pub fn retries_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.config.max_retries
    }

    /// Delay before the (attempt+1)-th retry: base × multiplier^attempt,
    /// capped, with jitter to spread reconnecting clients apart
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_delay =
            self.config.base_delay_ms as f64 * self.config.backoff_multiplier.powi(attempt as i32);

        let capped_delay = base_delay.min(self.config.max_delay_ms as f64);

        let jitter_range = capped_delay * self.config.jitter_factor;
        let jitter = (rand::random::<f64>() - 0.5) * jitter_range * 2.0;
        let final_delay = (capped_delay + jitter).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0, // No jitter for predictable testing
        };

        let policy = RetryPolicy::new(config);

        assert_eq!(policy.delay_for(0).as_millis(), 1000);
        assert_eq!(policy.delay_for(1).as_millis(), 2000);
        assert_eq!(policy.delay_for(2).as_millis(), 4000);
    }

    #[test]
    fn test_max_delay_cap() {
        let config = RetryConfig {
            max_retries: 10,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        };

        let policy = RetryPolicy::new(config);
        assert!(policy.delay_for(10).as_millis() <= 5000);
    }

    #[test]
    fn test_retry_budget() {
        let policy = RetryPolicy::with_defaults();

        assert!(!policy.retries_exhausted(0));
        assert!(!policy.retries_exhausted(2));
        assert!(policy.retries_exhausted(3));
        assert!(policy.retries_exhausted(4));
    }
}
