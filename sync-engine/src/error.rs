//! Error types for the sync engine

use thiserror::Error;

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sync errors
#[derive(Error, Debug)]
pub enum Error {
    /// Outbox error
    #[error("Outbox error: {0}")]
    Outbox(#[from] outbox::Error),

    /// Transport failure; the submission may be retried
    #[error("Network error: {0}")]
    Network(String),

    /// Submission timed out; outcome unknown, never assumed successful
    #[error("Submission timed out after {after_ms}ms")]
    Timeout {
        /// Configured timeout that elapsed
        after_ms: u64,
    },

    /// Server state diverged from the local assumption; needs caller review
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another drain pass is already running (single-flight)
    #[error("a sync pass is already in progress")]
    SyncInProgress,

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether a retry with backoff can resolve this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout { .. })
    }
}

impl From<prometheus::Error> for Error {
    fn from(err: prometheus::Error) -> Self {
        Error::Metrics(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
