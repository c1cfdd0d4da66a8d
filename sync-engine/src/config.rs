//! Configuration for the sync engine

use crate::retry::RetryConfig;
use serde::{Deserialize, Serialize};

/// Sync engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Timeout per remote submission (milliseconds).
    ///
    /// An elapsed timeout is an unknown outcome: the entry stays retryable
    /// and the idempotency key makes the eventual retry safe.
    pub submit_timeout_ms: u64,

    /// Retry configuration
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            submit_timeout_ms: 10_000, // 10 seconds
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(raw) = std::env::var("SYNC_SUBMIT_TIMEOUT_MS") {
            config.submit_timeout_ms = raw
                .parse()
                .map_err(|e| crate::Error::Config(format!("Bad timeout: {}", e)))?;
        }

        if let Ok(raw) = std::env::var("SYNC_MAX_RETRIES") {
            config.retry.max_retries = raw
                .parse()
                .map_err(|e| crate::Error::Config(format!("Bad retry count: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.submit_timeout_ms, 10_000);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_src = r#"
            submit_timeout_ms = 2000

            [retry]
            max_retries = 5
            base_delay_ms = 100
            max_delay_ms = 1000
            backoff_multiplier = 2.0
            jitter_factor = 0.0
        "#;

        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.submit_timeout_ms, 2000);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 100);
    }
}
