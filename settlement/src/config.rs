//! Configuration for settlement planning

use serde::{Deserialize, Serialize};

/// Settlement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Positions at or below this many minor units count as settled.
    ///
    /// Zero settles down to the exact cent; raise it to ignore dust left by
    /// an upstream importer.
    pub epsilon_minor_units: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            epsilon_minor_units: 0,
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

        if let Ok(raw) = std::env::var("SETTLEMENT_EPSILON_MINOR_UNITS") {
            config.epsilon_minor_units = raw
                .parse()
                .map_err(|e| crate::Error::Config(format!("Bad epsilon: {}", e)))?;
        }

        Ok(config)
    }
}
