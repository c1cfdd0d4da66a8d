//! Error types for the outbox

use crate::types::EntryStatus;
use thiserror::Error;
use uuid::Uuid;

/// Result type for outbox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Outbox errors
#[derive(Error, Debug)]
pub enum Error {
    /// Fingerprint collision inside the dedup window
    #[error("duplicate mutation: entry {existing} already carries this fingerprint")]
    DuplicateMutation {
        /// Client id of the entry holding the fingerprint
        existing: Uuid,
    },

    /// Entry not found
    #[error("Entry not found: {0}")]
    EntryNotFound(Uuid),

    /// Illegal status transition
    #[error("entry {client_id} cannot move {from:?} -> {to:?}")]
    InvalidTransition {
        /// Entry being transitioned
        client_id: Uuid,
        /// Current status
        from: EntryStatus,
        /// Requested status
        to: EntryStatus,
    },

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

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

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
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
