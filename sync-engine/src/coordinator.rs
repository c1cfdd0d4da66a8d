//! Sync coordinator
//!
//! Drains the outbox against the remote ledger. One pass:
//!
//! 1. Claim the single-flight lock (a second caller is refused, not queued)
//! 2. Snapshot drainable entries in creation order
//! 3. Per entry: `syncing → synced` on ack, `→ failed` with backoff and
//!    retry on transport trouble, `→ failed (parked)` on conflict,
//!    `→ permanently-failed` once the retry budget is spent
//!
//! A failure in one entry never aborts the rest of the queue. Submissions
//! run under a timeout; an elapsed timeout is an *unknown outcome* and the
//! entry stays retryable; the idempotency key makes the eventual retry
//! safe. Cancellation is honored between entries and between retry
//! attempts, never mid-step.

use crate::{
    client::{RemoteLedger, SubmitAck},
    config::Config,
    error::{Error, Result},
    metrics::Metrics,
    progress::{ProgressTracker, SyncPhase, SyncReport},
    retry::RetryPolicy,
};
use outbox::{OutboxCounts, OutboxEntry, OutboxStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};

/// Coordinates outbox drains against the remote ledger
pub struct SyncCoordinator {
    /// Local queue (injected)
    outbox: Arc<OutboxStore>,

    /// Remote submission client (injected)
    remote: Arc<dyn RemoteLedger>,

    /// Backoff policy
    policy: RetryPolicy,

    /// Per-submission timeout
    submit_timeout: Duration,

    /// Single-flight guard: at most one drain pass system-wide
    drain_lock: Mutex<()>,

    /// Progress state machine
    progress: ProgressTracker,

    /// Abort flag checked between entries
    cancelled: AtomicBool,

    /// Metrics collector
    metrics: Metrics,
}

impl SyncCoordinator {
    /// Create coordinator from injected collaborators
    pub fn new(
        outbox: Arc<OutboxStore>,
        remote: Arc<dyn RemoteLedger>,
        config: Config,
    ) -> Result<Self> {
        Ok(Self {
            outbox,
            remote,
            policy: RetryPolicy::new(config.retry),
            submit_timeout: Duration::from_millis(config.submit_timeout_ms),
            drain_lock: Mutex::new(()),
            progress: ProgressTracker::new(),
            cancelled: AtomicBool::new(false),
            metrics: Metrics::new()?,
        })
    }

    /// Subscribe to drain progress
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.progress.subscribe()
    }

    /// Metrics collector for this coordinator
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Queue depth by outcome (pending work vs dead letters)
    pub fn queue_counts(&self) -> Result<OutboxCounts> {
        Ok(self.outbox.counts()?)
    }

    /// Ask a running drain pass to stop after the entry it is working on
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Drain the outbox in creation order.
    ///
    /// # Errors
    ///
    /// [`Error::SyncInProgress`] when another pass holds the single-flight
    /// lock. Per-entry failures land in the report, not in the `Err`
    /// channel.
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let _guard = self
            .drain_lock
            .try_lock()
            .map_err(|_| Error::SyncInProgress)?;
        self.cancelled.store(false, Ordering::SeqCst);

        let started = Instant::now();
        let entries = self.outbox.list_pending()?;

        let mut report = SyncReport {
            total: entries.len(),
            processed: 0,
            errors: 0,
        };
        self.progress.publish(SyncPhase::Draining {
            processed: 0,
            total: report.total,
        });

        tracing::info!(total = report.total, "Drain pass started");

        for entry in entries {
            if self.cancelled.load(Ordering::SeqCst) {
                tracing::warn!(
                    processed = report.processed,
                    total = report.total,
                    "Drain pass cancelled"
                );
                break;
            }

            match self.process_entry(&entry).await {
                Ok(()) => report.processed += 1,
                Err(err) => {
                    report.errors += 1;
                    tracing::warn!(
                        client_id = %entry.client_id,
                        error = %err,
                        "Entry did not sync"
                    );
                }
            }

            self.progress.publish(SyncPhase::Draining {
                processed: report.processed + report.errors,
                total: report.total,
            });
        }

        self.metrics
            .record_drain_duration(started.elapsed().as_secs_f64());
        self.progress.publish(SyncPhase::Completed(report));

        tracing::info!(
            total = report.total,
            processed = report.processed,
            errors = report.errors,
            "Drain pass finished"
        );

        Ok(report)
    }

    /// Push one entry through the remote store, retrying with backoff.
    async fn process_entry(&self, entry: &OutboxEntry) -> Result<()> {
        let client_id = entry.client_id;
        let mut retry_count = entry.retry_count;

        self.outbox.mark_syncing(client_id)?;

        loop {
            // A crash between the failure mark and retirement can leave an
            // entry already out of budget.
            if self.policy.retries_exhausted(retry_count) {
                self.outbox
                    .mark_permanently_failed(client_id, "retries exhausted")?;
                self.metrics.record_permanent_failure();
                return Err(Error::Other(format!(
                    "entry {} exhausted its retry budget",
                    client_id
                )));
            }

            let submission = match tokio::time::timeout(
                self.submit_timeout,
                self.remote.submit_mutation(client_id, &entry.mutation),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    after_ms: self.submit_timeout.as_millis() as u64,
                }),
            };

            match submission {
                Ok(ack) => {
                    if let SubmitAck::Duplicate { canonical_id } = ack {
                        tracing::info!(
                            client_id = %client_id,
                            canonical_id = %canonical_id,
                            "Remote already held this key; treating as synced"
                        );
                    }
                    self.outbox.mark_synced(client_id, ack.canonical_id())?;
                    self.metrics.record_synced();
                    return Ok(());
                }

                Err(Error::Conflict(reason)) => {
                    self.outbox.mark_conflicted(client_id, &reason)?;
                    self.metrics.record_conflict();
                    tracing::error!(
                        client_id = %client_id,
                        reason = %reason,
                        "Server conflict; entry parked for review"
                    );
                    return Err(Error::Conflict(reason));
                }

                Err(err) if err.is_retryable() => {
                    retry_count += 1;
                    self.metrics.record_retry();
                    self.outbox
                        .mark_failed(client_id, &err.to_string(), retry_count)?;

                    if self.policy.retries_exhausted(retry_count) {
                        self.outbox
                            .mark_permanently_failed(client_id, "retries exhausted")?;
                        self.metrics.record_permanent_failure();
                        tracing::error!(
                            client_id = %client_id,
                            attempts = retry_count,
                            "Entry permanently failed"
                        );
                        return Err(err);
                    }

                    if self.cancelled.load(Ordering::SeqCst) {
                        // Left in Failed; the next pass resumes it.
                        return Err(err);
                    }

                    let delay = self.policy.delay_for(retry_count - 1);
                    tracing::warn!(
                        client_id = %client_id,
                        attempt = retry_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Submission failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    self.outbox.mark_syncing(client_id)?;
                }

                Err(err) => {
                    // Unexpected terminal error: burn budget so it cannot
                    // loop across passes forever.
                    self.outbox
                        .mark_failed(client_id, &err.to_string(), retry_count + 1)?;
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InProcessRemote;
    use crate::retry::RetryConfig;
    use async_trait::async_trait;
    use ledger_core::{
        Currency, ExpenseDraft, LedgerMutation, LedgerStore, ShareSpec, SplitType,
    };
    use rust_decimal::Decimal;
    use std::sync::atomic::AtomicUsize;
    use uuid::Uuid;

    struct Harness {
        store: Arc<LedgerStore>,
        outbox: Arc<OutboxStore>,
        group_id: Uuid,
        payer: Uuid,
        _dirs: (tempfile::TempDir, tempfile::TempDir),
    }

    fn harness() -> Harness {
        let ledger_dir = tempfile::tempdir().unwrap();
        let outbox_dir = tempfile::tempdir().unwrap();

        let mut ledger_config = ledger_core::Config::default();
        ledger_config.data_dir = ledger_dir.path().to_path_buf();
        let store = Arc::new(LedgerStore::open(ledger_config).unwrap());

        let mut outbox_config = outbox::Config::default();
        outbox_config.data_dir = outbox_dir.path().to_path_buf();
        outbox_config.sync_writes = false;
        let outbox = Arc::new(OutboxStore::open(outbox_config).unwrap());

        let user = store.create_user("Asha", "asha@example.com").unwrap();
        let group = store
            .create_group("flat", Currency::new("INR"), user.user_id)
            .unwrap();

        Harness {
            store,
            outbox,
            group_id: group.group_id,
            payer: user.user_id,
            _dirs: (ledger_dir, outbox_dir),
        }
    }

    fn expense_mutation(h: &Harness, cents: i64, description: &str) -> LedgerMutation {
        LedgerMutation::CreateExpense(ExpenseDraft {
            group_id: h.group_id,
            description: description.to_string(),
            amount: Decimal::new(cents, 2),
            payer_id: h.payer,
            split_type: SplitType::Equal,
            expense_date: chrono::Utc::now(),
            shares: vec![ShareSpec::equal(h.payer)],
        })
    }

    fn fast_config() -> Config {
        Config {
            submit_timeout_ms: 200,
            retry: RetryConfig {
                max_retries: 3,
                base_delay_ms: 1,
                max_delay_ms: 5,
                backoff_multiplier: 2.0,
                jitter_factor: 0.0,
            },
        }
    }

    /// Remote that fails every submission with a network error
    struct DeadRemote {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteLedger for DeadRemote {
        async fn submit_mutation(
            &self,
            _client_id: Uuid,
            _mutation: &LedgerMutation,
        ) -> Result<SubmitAck> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Network("connection refused".to_string()))
        }
    }

    /// Remote that rejects everything as conflicted
    struct ConflictRemote;

    #[async_trait]
    impl RemoteLedger for ConflictRemote {
        async fn submit_mutation(
            &self,
            _client_id: Uuid,
            _mutation: &LedgerMutation,
        ) -> Result<SubmitAck> {
            Err(Error::Conflict("expense superseded on server".to_string()))
        }
    }

    /// Remote whose first submission applies server-side but hangs before
    /// responding: the ambiguous-timeout case.
    struct HangAfterApplyRemote {
        inner: InProcessRemote,
        first: AtomicBool,
    }

    #[async_trait]
    impl RemoteLedger for HangAfterApplyRemote {
        async fn submit_mutation(
            &self,
            client_id: Uuid,
            mutation: &LedgerMutation,
        ) -> Result<SubmitAck> {
            let ack = self.inner.submit_mutation(client_id, mutation).await?;
            if self.first.swap(false, Ordering::SeqCst) {
                // Response lost: hang until the caller's timeout fires
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(ack)
        }
    }

    /// Remote that takes a fixed time per submission
    struct SlowRemote {
        inner: InProcessRemote,
        delay: Duration,
    }

    #[async_trait]
    impl RemoteLedger for SlowRemote {
        async fn submit_mutation(
            &self,
            client_id: Uuid,
            mutation: &LedgerMutation,
        ) -> Result<SubmitAck> {
            tokio::time::sleep(self.delay).await;
            self.inner.submit_mutation(client_id, mutation).await
        }
    }

    #[tokio::test]
    async fn test_drain_happy_path() {
        let h = harness();
        let remote = Arc::new(InProcessRemote::new(h.store.clone()));
        let coordinator =
            SyncCoordinator::new(h.outbox.clone(), remote, fast_config()).unwrap();

        let first = h.outbox.enqueue(expense_mutation(&h, 90000, "rent")).unwrap();
        let second = h.outbox.enqueue(expense_mutation(&h, 1200, "coffee")).unwrap();

        let report = coordinator.sync_all().await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                total: 2,
                processed: 2,
                errors: 0
            }
        );

        // Queue drained, canonical ids linked, records materialized in order
        assert!(h.outbox.list_pending().unwrap().is_empty());
        let ledger = h.store.get_group_ledger(h.group_id).unwrap();
        assert_eq!(ledger.expenses.len(), 2);
        assert_eq!(
            h.outbox.canonical_id_for(first.client_id).unwrap(),
            Some(ledger.expenses[0].expense.expense_id)
        );
        assert_eq!(
            h.outbox.canonical_id_for(second.client_id).unwrap(),
            Some(ledger.expenses[1].expense.expense_id)
        );
    }

    #[tokio::test]
    async fn test_failing_entry_becomes_permanent_after_retries() {
        let h = harness();
        let remote = Arc::new(DeadRemote {
            calls: AtomicUsize::new(0),
        });
        let coordinator =
            SyncCoordinator::new(h.outbox.clone(), remote.clone(), fast_config()).unwrap();

        h.outbox.enqueue(expense_mutation(&h, 5000, "taxi")).unwrap();

        let report = coordinator.sync_all().await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.processed, 0);
        assert_eq!(report.errors, 1);

        // Exactly max_retries attempts were made
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);

        // Reported once, as a dead letter, excluded from the next pass
        let counts = coordinator.queue_counts().unwrap();
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.permanently_failed, 1);

        let second = coordinator.sync_all().await.unwrap();
        assert_eq!(second.total, 0);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 3);
        assert_eq!(coordinator.metrics().permanent_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_conflict_parks_entry_without_retry() {
        let h = harness();
        let coordinator = SyncCoordinator::new(
            h.outbox.clone(),
            Arc::new(ConflictRemote),
            fast_config(),
        )
        .unwrap();

        let entry = h.outbox.enqueue(expense_mutation(&h, 7000, "hotel")).unwrap();

        let report = coordinator.sync_all().await.unwrap();
        assert_eq!(report.errors, 1);
        assert_eq!(coordinator.metrics().conflicts_total.get(), 1);

        let parked = h.outbox.get_entry(entry.client_id).unwrap();
        assert!(parked.requires_ack);
        assert_eq!(
            parked.last_error.as_deref(),
            Some("expense superseded on server")
        );

        // Not picked up again until acknowledged
        let second = coordinator.sync_all().await.unwrap();
        assert_eq!(second.total, 0);
    }

    #[tokio::test]
    async fn test_timeout_retry_resolves_via_idempotency() {
        let h = harness();
        let remote = Arc::new(HangAfterApplyRemote {
            inner: InProcessRemote::new(h.store.clone()),
            first: AtomicBool::new(true),
        });
        let coordinator =
            SyncCoordinator::new(h.outbox.clone(), remote, fast_config()).unwrap();

        h.outbox.enqueue(expense_mutation(&h, 30000, "flights")).unwrap();

        let report = coordinator.sync_all().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.errors, 0);

        // The hung first attempt applied server-side; the retry collapsed
        // into a Duplicate ack. Exactly one expense exists.
        let ledger = h.store.get_group_ledger(h.group_id).unwrap();
        assert_eq!(ledger.expenses.len(), 1);
        assert_eq!(h.store.metrics().duplicate_submissions_total.get(), 1);
        assert_eq!(coordinator.metrics().retries_total.get(), 1);
    }

    #[tokio::test]
    async fn test_single_flight_rejects_second_pass() {
        let h = harness();
        let remote = Arc::new(SlowRemote {
            inner: InProcessRemote::new(h.store.clone()),
            delay: Duration::from_millis(150),
        });
        let mut config = fast_config();
        config.submit_timeout_ms = 5_000;
        let coordinator =
            Arc::new(SyncCoordinator::new(h.outbox.clone(), remote, config).unwrap());

        h.outbox.enqueue(expense_mutation(&h, 1000, "a")).unwrap();
        h.outbox.enqueue(expense_mutation(&h, 2000, "b")).unwrap();

        let background = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.sync_all().await })
        };

        // Give the background pass time to take the lock
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            coordinator.sync_all().await.unwrap_err(),
            Error::SyncInProgress
        ));

        let report = background.await.unwrap().unwrap();
        assert_eq!(report.processed, 2);

        // Lock released: a fresh pass runs (and finds nothing)
        assert_eq!(coordinator.sync_all().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_between_entries() {
        let h = harness();
        let remote = Arc::new(SlowRemote {
            inner: InProcessRemote::new(h.store.clone()),
            delay: Duration::from_millis(150),
        });
        let mut config = fast_config();
        config.submit_timeout_ms = 5_000;
        let coordinator =
            Arc::new(SyncCoordinator::new(h.outbox.clone(), remote, config).unwrap());

        for (cents, what) in [(1000, "a"), (2000, "b"), (3000, "c")] {
            h.outbox.enqueue(expense_mutation(&h, cents, what)).unwrap();
        }

        let background = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.sync_all().await })
        };

        // Cancel while the first entry is still in flight
        tokio::time::sleep(Duration::from_millis(30)).await;
        coordinator.cancel();

        let report = background.await.unwrap().unwrap();
        assert_eq!(report.processed, 1);

        // The in-flight entry finished cleanly; the rest stayed queued
        assert_eq!(h.outbox.list_pending().unwrap().len(), 2);
        let ledger = h.store.get_group_ledger(h.group_id).unwrap();
        assert_eq!(ledger.expenses.len(), 1);
    }
}
