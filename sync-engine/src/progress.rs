//! Sync progress as an observable state machine
//!
//! Progress is published through a `tokio::sync::watch` channel instead of
//! being pushed into any rendering layer: UIs, bots, and tests subscribe and
//! react to the same phases.

use tokio::sync::watch;

/// Result of one drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Entries the pass set out to drain
    pub total: usize,

    /// Entries that reached the remote store and were removed locally
    pub processed: usize,

    /// Entries that ended the pass in a failure state
    pub errors: usize,
}

/// Phase of the sync state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No drain pass running
    Idle,
    /// Drain pass underway
    Draining {
        /// Entries finished so far (synced or failed)
        processed: usize,
        /// Entries in this pass
        total: usize,
    },
    /// Last drain pass finished with this report
    Completed(SyncReport),
}

/// Publisher side of the progress channel
#[derive(Debug)]
pub struct ProgressTracker {
    tx: watch::Sender<SyncPhase>,
}

impl ProgressTracker {
    /// Create a tracker starting in `Idle`
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncPhase::Idle);
        Self { tx }
    }

    /// Subscribe to phase changes
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.tx.subscribe()
    }

    /// Publish a new phase (no receivers is fine)
    pub(crate) fn publish(&self, phase: SyncPhase) {
        self.tx.send_replace(phase);
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
