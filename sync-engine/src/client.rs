//! Remote submission client
//!
//! The coordinator talks to the authoritative store through the
//! [`RemoteLedger`] trait, so transports (HTTP, in-process, test fakes) are
//! interchangeable and injected, never global.

use crate::error::{Error, Result};
use async_trait::async_trait;
use ledger_core::{LedgerMutation, LedgerStore, SubmitOutcome};
use std::sync::Arc;
use uuid::Uuid;

/// Successful submission acknowledgment.
///
/// `Duplicate` is success: the server saw this idempotency key before and
/// returns the canonical id it already materialized. This is what makes a
/// retry after an ambiguous timeout safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitAck {
    /// First application of this client id
    Created {
        /// Server-assigned id of the new record
        canonical_id: Uuid,
    },
    /// The key was seen before; nothing was re-applied
    Duplicate {
        /// Id materialized by the original submission
        canonical_id: Uuid,
    },
}

impl SubmitAck {
    /// Canonical id regardless of first-or-repeat
    pub fn canonical_id(&self) -> Uuid {
        match self {
            SubmitAck::Created { canonical_id } | SubmitAck::Duplicate { canonical_id } => {
                *canonical_id
            }
        }
    }
}

/// Client for submitting outbox entries to the authoritative ledger
#[async_trait]
pub trait RemoteLedger: Send + Sync {
    /// Submit one mutation under its idempotency key.
    ///
    /// # Errors
    ///
    /// [`Error::Network`]/[`Error::Timeout`] are retryable;
    /// [`Error::Conflict`] means the server rejected the mutation outright
    /// and a retry cannot fix it.
    async fn submit_mutation(&self, client_id: Uuid, mutation: &LedgerMutation)
        -> Result<SubmitAck>;
}

/// Adapter submitting directly into an in-process [`LedgerStore`].
///
/// Used by the demo and by tests; a deployment pointing at a real backend
/// implements [`RemoteLedger`] over its transport instead.
pub struct InProcessRemote {
    store: Arc<LedgerStore>,
}

impl InProcessRemote {
    /// Wrap a ledger store
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RemoteLedger for InProcessRemote {
    async fn submit_mutation(
        &self,
        client_id: Uuid,
        mutation: &LedgerMutation,
    ) -> Result<SubmitAck> {
        match self.store.submit(client_id, mutation) {
            Ok(SubmitOutcome::Created { canonical_id }) => Ok(SubmitAck::Created { canonical_id }),
            Ok(SubmitOutcome::Duplicate { canonical_id }) => {
                Ok(SubmitAck::Duplicate { canonical_id })
            }
            // The server-side ledger found the mutation invalid against its
            // current state: a retry cannot fix that.
            Err(
                err @ (ledger_core::Error::Validation(_)
                | ledger_core::Error::GroupNotFound(_)
                | ledger_core::Error::UserNotFound(_)),
            ) => Err(Error::Conflict(err.to_string())),
            Err(err) => Err(Error::Network(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Currency, ExpenseDraft, ShareSpec, SplitType};
    use rust_decimal::Decimal;

    fn scratch_store() -> (Arc<LedgerStore>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = ledger_core::Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Arc::new(LedgerStore::open(config).unwrap()), temp_dir)
    }

    #[tokio::test]
    async fn test_in_process_submit_and_duplicate() {
        let (store, _temp) = scratch_store();
        let remote = InProcessRemote::new(store.clone());

        let user = store.create_user("Asha", "asha@example.com").unwrap();
        let group = store
            .create_group("flat", Currency::new("INR"), user.user_id)
            .unwrap();

        let client_id = Uuid::new_v4();
        let mutation = LedgerMutation::CreateExpense(ExpenseDraft {
            group_id: group.group_id,
            description: "wifi".to_string(),
            amount: Decimal::new(9900, 2),
            payer_id: user.user_id,
            split_type: SplitType::Equal,
            expense_date: chrono::Utc::now(),
            shares: vec![ShareSpec::equal(user.user_id)],
        });

        let first = remote.submit_mutation(client_id, &mutation).await.unwrap();
        let canonical = match first {
            SubmitAck::Created { canonical_id } => canonical_id,
            other => panic!("expected Created, got {other:?}"),
        };

        let second = remote.submit_mutation(client_id, &mutation).await.unwrap();
        assert_eq!(second, SubmitAck::Duplicate { canonical_id: canonical });
    }

    #[tokio::test]
    async fn test_validation_failure_is_conflict() {
        let (store, _temp) = scratch_store();
        let remote = InProcessRemote::new(store.clone());

        let user = store.create_user("Asha", "asha@example.com").unwrap();
        let group = store
            .create_group("flat", Currency::new("INR"), user.user_id)
            .unwrap();
        // Noor exists but is never added to the group
        let outsider = store.create_user("Noor", "noor@example.com").unwrap();

        let mutation = LedgerMutation::CreateExpense(ExpenseDraft {
            group_id: group.group_id,
            description: "wifi".to_string(),
            amount: Decimal::new(9900, 2),
            payer_id: outsider.user_id,
            split_type: SplitType::Equal,
            expense_date: chrono::Utc::now(),
            shares: vec![ShareSpec::equal(outsider.user_id)],
        });

        let err = remote
            .submit_mutation(Uuid::new_v4(), &mutation)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(!err.is_retryable());
    }
}
