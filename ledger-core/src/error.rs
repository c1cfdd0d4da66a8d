//! Error types for the ledger

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Write rejected synchronously; nothing was persisted
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    /// Group not found
    #[error("Group not found: {0}")]
    GroupNotFound(Uuid),

    /// Expense not found
    #[error("Expense not found: {0}")]
    ExpenseNotFound(Uuid),

    /// Payment not found
    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    /// Illegal status transition
    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(String),

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

/// Reasons a write request is rejected at validation time.
///
/// These never reach storage: the offending draft is bounced back to the
/// caller in the same request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Participant shares disagree with the stated total beyond tolerance
    #[error("participant shares sum to {submitted} but expense amount is {stated}")]
    ShareSumMismatch {
        /// Amount stated on the expense
        stated: Decimal,
        /// Sum of the submitted shares
        submitted: Decimal,
    },

    /// Referenced user is not a member of the target group
    #[error("user {0} is not a member of the group")]
    UnknownParticipant(Uuid),

    /// Amounts must be strictly positive
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// An expense needs at least one participant
    #[error("expense has no participants")]
    EmptyParticipants,

    /// The same user appears twice in one split
    #[error("user {0} appears more than once in the split")]
    DuplicateParticipant(Uuid),

    /// Percentages must sum to 100
    #[error("share percentages sum to {0}, expected 100")]
    PercentageSumMismatch(Decimal),

    /// The split type requires a field the spec did not carry
    #[error("split requires an explicit {field} for user {user_id}")]
    MissingShare {
        /// User whose spec is incomplete
        user_id: Uuid,
        /// Name of the missing field
        field: &'static str,
    },

    /// Rounding residue pushed a share below zero
    #[error("share for user {user_id} is negative after rounding: {amount}")]
    NegativeShare {
        /// User whose share went negative
        user_id: Uuid,
        /// The offending share amount
        amount: Decimal,
    },

    /// Writes are only accepted into active groups
    #[error("group {0} is not active")]
    GroupNotActive(Uuid),

    /// A payment cannot pay its own sender
    #[error("payment sender and receiver are the same user: {0}")]
    SelfPayment(Uuid),
}
