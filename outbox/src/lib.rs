//! Offline Outbox
//!
//! Durable local queue of mutations created while disconnected. Every write
//! is fsynced before the caller is told it succeeded, a content fingerprint
//! keeps retried UI actions from enqueueing twice, and each entry carries a
//! permanent client-generated UUID that serves as the idempotency key during
//! sync.
//!
//! # Entry lifecycle
//!
//! ```text
//! pending ──► syncing ──► synced (deleted, canonical id linked)
//!                │
//!                ▼
//!             failed ──► syncing (retry with backoff)
//!                │
//!                ▼
//!      permanently-failed (terminal, needs caller review)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod store;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, DEFAULT_DEDUP_WINDOW_SECS};
pub use store::OutboxStore;
pub use types::{EntryStatus, OutboxCounts, OutboxEntry, SyncedLink};
