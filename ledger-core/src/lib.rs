//! Tally Ledger Core
//!
//! Authoritative store for group expense ledgers: users, groups,
//! memberships, expenses with participant shares, and settlement payments.
//!
//! # Architecture
//!
//! - **Relational rows on RocksDB**: one column family per record kind,
//!   composite-key indices for per-group creation-order scans
//! - **Validate-then-commit**: writes are rejected synchronously on
//!   validation failure; accepted writes commit atomically in one batch
//! - **Derived balances**: member balances are recomputed from ledger state
//!   on every read, never cached
//! - **Idempotent submission**: replayed offline mutations are collapsed by
//!   client id, returning the originally materialized canonical id
//!
//! # Invariants
//!
//! - Participant shares of an expense sum exactly to the expense amount
//! - Group balances sum to exactly zero at all times
//! - A client id materializes at most one record, ever

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod balance;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod shares;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result, ValidationError};
pub use ledger::LedgerStore;
pub use storage::Storage;
pub use types::{
    Currency, Expense, ExpenseDraft, ExpenseParticipant, ExpenseStatus, ExpenseWithShares, Group,
    GroupLedger, GroupMember, GroupStatus, IdentityProvider, LedgerMutation, MemberRole, Payment,
    PaymentDraft, PaymentStatus, ShareSpec, SplitType, SubmitOutcome, User,
};
