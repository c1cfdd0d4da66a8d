//! Core types for the offline outbox

use crate::fingerprint::Fingerprint;
use chrono::{DateTime, Utc};
use ledger_core::LedgerMutation;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entry lifecycle status
///
/// `pending → syncing → synced | failed`; failed entries re-enter `syncing`
/// on retry until retries are exhausted, then land in `permanently-failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntryStatus {
    /// Queued, not yet submitted
    Pending = 1,
    /// A drain pass has claimed the entry
    Syncing = 2,
    /// Acknowledged by the remote store (entry is deleted, link retained)
    Synced = 3,
    /// Submission failed; eligible for retry or caller review
    Failed = 4,
    /// Retries exhausted; excluded from automatic drains (terminal)
    PermanentlyFailed = 5,
}

impl EntryStatus {
    /// Whether `next` is a legal transition from this status.
    ///
    /// `Syncing → Syncing` is allowed so a drain pass can re-claim an entry
    /// left stale by a crashed predecessor.
    pub fn can_transition(self, next: EntryStatus) -> bool {
        matches!(
            (self, next),
            (EntryStatus::Pending, EntryStatus::Syncing)
                | (EntryStatus::Syncing, EntryStatus::Syncing)
                | (EntryStatus::Syncing, EntryStatus::Synced)
                | (EntryStatus::Syncing, EntryStatus::Failed)
                | (EntryStatus::Syncing, EntryStatus::PermanentlyFailed)
                | (EntryStatus::Failed, EntryStatus::Syncing)
                | (EntryStatus::Failed, EntryStatus::PermanentlyFailed)
        )
    }

    /// Check if the status is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, EntryStatus::Synced | EntryStatus::PermanentlyFailed)
    }

    /// Whether a drain pass should pick the entry up.
    ///
    /// Stale `Syncing` entries count: a crashed pass may have left them
    /// claimed, and the idempotency key makes re-submission safe.
    pub fn is_drainable(self) -> bool {
        matches!(
            self,
            EntryStatus::Pending | EntryStatus::Syncing | EntryStatus::Failed
        )
    }
}

/// A locally queued mutation awaiting sync.
///
/// The `client_id` is generated at enqueue time and never changes; it doubles
/// as the idempotency key the remote store uses to collapse duplicate
/// submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Client-generated UUID, permanent identity of this mutation
    pub client_id: Uuid,

    /// The queued mutation
    pub mutation: LedgerMutation,

    /// Lifecycle status
    pub status: EntryStatus,

    /// Submission attempts so far
    pub retry_count: u32,

    /// Enqueue timestamp (drain order)
    pub created_at: DateTime<Utc>,

    /// Content fingerprint used for local dedup
    pub fingerprint: Fingerprint,

    /// Set when the server reported a conflict: the entry sits out of
    /// automatic drains until the caller reviews it
    pub requires_ack: bool,

    /// Last submission error, if any
    pub last_error: Option<String>,
}

impl OutboxEntry {
    /// Whether a drain pass should pick this entry up.
    ///
    /// Conflicted entries keep the `Failed` status but are parked until
    /// acknowledged.
    pub fn is_drainable(&self) -> bool {
        self.status.is_drainable() && !self.requires_ack
    }
}

/// Link from a synced entry's client id to the server-assigned canonical id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedLink {
    /// Canonical id the mutation materialized as
    pub canonical_id: Uuid,

    /// When the entry synced
    pub synced_at: DateTime<Utc>,
}

/// Queue depth broken out by outcome, so pending work and dead letters are
/// visibly distinguishable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutboxCounts {
    /// Entries waiting to sync (pending, claimed, or retryable)
    pub pending: usize,

    /// Entries failed but still eligible for retry or review
    pub failed: usize,

    /// Entries that exhausted retries (terminal)
    pub permanently_failed: usize,
}
