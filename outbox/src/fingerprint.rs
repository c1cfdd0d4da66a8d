//! Content fingerprints for local dedup
//!
//! A fingerprint is the SHA-256 of a canonical JSON rendering of the
//! mutation's identity-relevant fields plus a coarse time bucket. Two
//! structurally identical mutations enqueued inside one bucket collide, which
//! is how a retried UI action is caught before it reaches the queue twice.
//!
//! Canonicalization: serde_json maps are key-sorted, the payload is rendered
//! compact, and amounts are normalized (`1.50` and `1.500` hash alike).

use chrono::{DateTime, Utc};
use ledger_core::LedgerMutation;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Default dedup window in seconds
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 5;

/// SHA-256 content fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of a mutation at a point in time.
    ///
    /// The timestamp is coarsened to `window_secs`-wide buckets; only the
    /// fields a user-facing retry would repeat verbatim enter the hash.
    pub fn compute(mutation: &LedgerMutation, at: DateTime<Utc>, window_secs: u64) -> Self {
        let bucket = at.timestamp().div_euclid(window_secs.max(1) as i64);

        // serde_json's default map is a BTreeMap, so keys serialize
        // sorted; that is the canonical form.
        let payload = match mutation {
            LedgerMutation::CreateExpense(draft) => serde_json::json!({
                "amount": draft.amount.normalize().to_string(),
                "bucket": bucket,
                "description": draft.description,
                "group_id": draft.group_id,
                "kind": mutation.kind(),
                "payer_id": draft.payer_id,
            }),
            LedgerMutation::CreatePayment(draft) => serde_json::json!({
                "amount": draft.amount.normalize().to_string(),
                "bucket": bucket,
                "from_user_id": draft.from_user_id,
                "group_id": draft.group_id,
                "kind": mutation.kind(),
                "to_user_id": draft.to_user_id,
            }),
        };

        let rendered = serde_json::to_vec(&payload).expect("canonical payload serializes");

        let mut hasher = Sha256::new();
        hasher.update(&rendered);
        Self(hasher.finalize().into())
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}
