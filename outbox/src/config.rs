//! Configuration for the outbox

use crate::fingerprint::DEFAULT_DEDUP_WINDOW_SECS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the local RocksDB queue
    pub data_dir: PathBuf,

    /// Width of the dedup time bucket in seconds
    pub dedup_window_secs: u64,

    /// Fsync enqueue writes before acknowledging them.
    ///
    /// The durability-first contract depends on this; only disable it in
    /// throwaway test setups.
    pub sync_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/outbox"),
            dedup_window_secs: DEFAULT_DEDUP_WINDOW_SECS,
            sync_writes: true,
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

        if let Ok(data_dir) = std::env::var("OUTBOX_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(raw) = std::env::var("OUTBOX_DEDUP_WINDOW_SECS") {
            config.dedup_window_secs = raw
                .parse()
                .map_err(|e| crate::Error::Config(format!("Bad dedup window: {}", e)))?;
        }

        Ok(config)
    }
}
