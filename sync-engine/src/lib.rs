//! Sync Engine
//!
//! Replays offline-queued mutations into the authoritative ledger without
//! duplication or loss.
//!
//! # Guarantees
//!
//! - **Single-flight**: at most one drain pass runs system-wide; a second
//!   caller is refused immediately rather than queued
//! - **Creation order**: entries drain in the order they were enqueued, so a
//!   payment never races ahead of the expense it references
//! - **At-least-once + idempotent**: every submission carries the entry's
//!   client id; the remote collapses repeats, so ambiguous timeouts are
//!   retried safely
//! - **Per-entry isolation**: one poisoned entry never blocks the queue
//! - **Bounded retries**: transport failures back off exponentially and
//!   retire into an explicit permanently-failed state after the budget is
//!   spent; conflicts park immediately for caller review
//!
//! Progress is observable through a watch channel
//! ([`SyncCoordinator::subscribe`]) rather than tied to any UI layer.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod progress;
pub mod retry;

// Re-exports
pub use client::{InProcessRemote, RemoteLedger, SubmitAck};
pub use config::Config;
pub use coordinator::SyncCoordinator;
pub use error::{Error, Result};
pub use progress::{ProgressTracker, SyncPhase, SyncReport};
pub use retry::{RetryConfig, RetryPolicy};
