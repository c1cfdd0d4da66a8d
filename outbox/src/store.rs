//! Durable outbox storage using RocksDB
//!
//! # Column Families
//!
//! - `entries` - Queued mutations (key: client_id)
//! - `order` - Creation-order index (key: created_at_nanos || client_id)
//! - `fingerprints` - Dedup guard (key: fingerprint, value: owning entry)
//! - `synced` - client_id → canonical_id links for synced entries
//!
//! # Durability
//!
//! An entry is fsynced before `enqueue` returns: a crash immediately after
//! the call cannot silently lose the write. The same applies to `mark_synced`
//! so an acknowledged entry is never replayed after restart (replay would be
//! harmless anyway, but it wastes a round trip).

use crate::{
    error::{Error, Result},
    fingerprint::Fingerprint,
    types::{EntryStatus, OutboxCounts, OutboxEntry, SyncedLink},
    Config,
};
use chrono::{DateTime, Utc};
use ledger_core::LedgerMutation;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ENTRIES: &str = "entries";
const CF_ORDER: &str = "order";
const CF_FINGERPRINTS: &str = "fingerprints";
const CF_SYNCED: &str = "synced";

/// Owner record behind a fingerprint key
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FingerprintRecord {
    client_id: Uuid,
    created_at: DateTime<Utc>,
}

/// Durable local queue of not-yet-confirmed mutations
pub struct OutboxStore {
    db: Arc<DB>,
    config: Config,
}

impl OutboxStore {
    /// Open or create the outbox database
    pub fn open(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ENTRIES, Options::default()),
            ColumnFamilyDescriptor::new(CF_ORDER, Options::default()),
            ColumnFamilyDescriptor::new(CF_FINGERPRINTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_SYNCED, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, &config.data_dir, cf_descriptors)?;

        tracing::info!("Opened outbox RocksDB at {:?}", config.data_dir);

        Ok(Self {
            db: Arc::new(db),
            config,
        })
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn durable_write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    // Enqueue

    /// Queue a mutation for later sync.
    ///
    /// Returns the persisted entry; its `client_id` is the idempotency key
    /// the sync pass will submit under.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateMutation`] when a structurally identical mutation
    /// was enqueued (or synced) inside the current dedup window.
    pub fn enqueue(&self, mutation: LedgerMutation) -> Result<OutboxEntry> {
        self.enqueue_at(mutation, Utc::now())
    }

    /// Queue a mutation with an explicit timestamp (deterministic tests)
    pub fn enqueue_at(&self, mutation: LedgerMutation, at: DateTime<Utc>) -> Result<OutboxEntry> {
        let fingerprint = Fingerprint::compute(&mutation, at, self.config.dedup_window_secs);

        if let Some(record) = self.fingerprint_get(&fingerprint)? {
            if self.entry_exists(record.client_id)? || self.synced_get(record.client_id)?.is_some() {
                tracing::warn!(
                    existing = %record.client_id,
                    fingerprint = %fingerprint,
                    "Duplicate mutation rejected"
                );
                return Err(Error::DuplicateMutation {
                    existing: record.client_id,
                });
            }
            // Stale record from a discarded entry: safe to overwrite.
        }

        let entry = OutboxEntry {
            client_id: Uuid::new_v4(),
            mutation,
            status: EntryStatus::Pending,
            retry_count: 0,
            created_at: at,
            fingerprint,
            requires_ack: false,
            last_error: None,
        };

        let mut batch = WriteBatch::default();

        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        batch.put_cf(cf_entries, entry.client_id.as_bytes(), bincode::serialize(&entry)?);

        let cf_order = self.cf_handle(CF_ORDER)?;
        batch.put_cf(cf_order, Self::order_key(&entry), []);

        let cf_fingerprints = self.cf_handle(CF_FINGERPRINTS)?;
        let record = FingerprintRecord {
            client_id: entry.client_id,
            created_at: at,
        };
        batch.put_cf(cf_fingerprints, fingerprint.as_bytes(), bincode::serialize(&record)?);

        self.db.write_opt(batch, &self.durable_write_opts())?;

        tracing::info!(
            client_id = %entry.client_id,
            kind = entry.mutation.kind(),
            group_id = %entry.mutation.group_id(),
            "Mutation enqueued"
        );

        Ok(entry)
    }

    // Reads

    /// Get entry by client id
    pub fn get_entry(&self, client_id: Uuid) -> Result<OutboxEntry> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        let value = self
            .db
            .get_cf(cf, client_id.as_bytes())?
            .ok_or(Error::EntryNotFound(client_id))?;
        Ok(bincode::deserialize(&value)?)
    }

    fn entry_exists(&self, client_id: Uuid) -> Result<bool> {
        let cf = self.cf_handle(CF_ENTRIES)?;
        Ok(self.db.get_cf(cf, client_id.as_bytes())?.is_some())
    }

    /// Entries a drain pass should process, in creation order.
    ///
    /// Includes `Pending`, retryable `Failed`, and `Syncing` entries left
    /// stale by a crashed pass; excludes terminal ones.
    pub fn list_pending(&self) -> Result<Vec<OutboxEntry>> {
        let cf_order = self.cf_handle(CF_ORDER)?;

        let mut entries = Vec::new();
        for item in self.db.iterator_cf(cf_order, IteratorMode::Start) {
            let (key, _) = item?;
            if key.len() < 16 {
                continue;
            }
            let id_bytes: [u8; 16] = key[key.len() - 16..]
                .try_into()
                .map_err(|_| Error::Storage("Malformed order key".to_string()))?;
            let entry = self.get_entry(Uuid::from_bytes(id_bytes))?;
            if entry.is_drainable() {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    /// Queue depth by outcome
    pub fn counts(&self) -> Result<OutboxCounts> {
        let cf = self.cf_handle(CF_ENTRIES)?;

        let mut counts = OutboxCounts::default();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let entry: OutboxEntry = bincode::deserialize(&value)?;
            match entry.status {
                EntryStatus::Pending | EntryStatus::Syncing => counts.pending += 1,
                EntryStatus::Failed => counts.failed += 1,
                EntryStatus::PermanentlyFailed => counts.permanently_failed += 1,
                EntryStatus::Synced => {}
            }
        }

        Ok(counts)
    }

    /// Canonical id a synced entry materialized as
    pub fn canonical_id_for(&self, client_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.synced_get(client_id)?.map(|link| link.canonical_id))
    }

    // Status transitions

    /// Claim an entry for submission
    pub fn mark_syncing(&self, client_id: Uuid) -> Result<OutboxEntry> {
        self.transition(client_id, EntryStatus::Syncing, |_| {})
    }

    /// Record a failed submission attempt
    pub fn mark_failed(&self, client_id: Uuid, reason: &str, retry_count: u32) -> Result<OutboxEntry> {
        self.transition(client_id, EntryStatus::Failed, |entry| {
            entry.retry_count = retry_count;
            entry.last_error = Some(reason.to_string());
        })
    }

    /// Retire an entry after retries are exhausted (terminal)
    pub fn mark_permanently_failed(&self, client_id: Uuid, reason: &str) -> Result<OutboxEntry> {
        self.transition(client_id, EntryStatus::PermanentlyFailed, |entry| {
            entry.last_error = Some(reason.to_string());
        })
    }

    /// Park an entry the server reported as conflicted.
    ///
    /// The entry stays `Failed` but is excluded from automatic drains until
    /// the caller resolves it via [`discard`](Self::discard) or
    /// [`requeue`](Self::requeue).
    pub fn mark_conflicted(&self, client_id: Uuid, reason: &str) -> Result<OutboxEntry> {
        self.transition(client_id, EntryStatus::Failed, |entry| {
            entry.requires_ack = true;
            entry.last_error = Some(reason.to_string());
        })
    }

    fn transition(
        &self,
        client_id: Uuid,
        to: EntryStatus,
        apply: impl FnOnce(&mut OutboxEntry),
    ) -> Result<OutboxEntry> {
        let mut entry = self.get_entry(client_id)?;

        if !entry.status.can_transition(to) {
            return Err(Error::InvalidTransition {
                client_id,
                from: entry.status,
                to,
            });
        }

        entry.status = to;
        apply(&mut entry);

        let cf = self.cf_handle(CF_ENTRIES)?;
        self.db
            .put_cf(cf, client_id.as_bytes(), bincode::serialize(&entry)?)?;

        tracing::debug!(client_id = %client_id, status = ?to, "Entry transitioned");
        Ok(entry)
    }

    /// Delete a synced entry and record its canonical id link.
    ///
    /// The link is what keeps a later duplicate of the same fingerprint out
    /// of the queue, and what `canonical_id_for` serves.
    pub fn mark_synced(&self, client_id: Uuid, canonical_id: Uuid) -> Result<()> {
        let entry = self.get_entry(client_id)?;

        if !entry.status.can_transition(EntryStatus::Synced) {
            return Err(Error::InvalidTransition {
                client_id,
                from: entry.status,
                to: EntryStatus::Synced,
            });
        }

        let mut batch = WriteBatch::default();

        let cf_entries = self.cf_handle(CF_ENTRIES)?;
        batch.delete_cf(cf_entries, client_id.as_bytes());

        let cf_order = self.cf_handle(CF_ORDER)?;
        batch.delete_cf(cf_order, Self::order_key(&entry));

        let cf_synced = self.cf_handle(CF_SYNCED)?;
        let link = SyncedLink {
            canonical_id,
            synced_at: Utc::now(),
        };
        batch.put_cf(cf_synced, client_id.as_bytes(), bincode::serialize(&link)?);

        self.db.write_opt(batch, &self.durable_write_opts())?;

        tracing::info!(
            client_id = %client_id,
            canonical_id = %canonical_id,
            "Entry synced and removed from queue"
        );

        Ok(())
    }

    // Caller acknowledgment

    /// Drop a failed entry after the caller has reviewed it.
    ///
    /// Also releases its fingerprint, so the same mutation can be enqueued
    /// again deliberately.
    pub fn discard(&self, client_id: Uuid) -> Result<()> {
        let entry = self.get_entry(client_id)?;

        if !matches!(
            entry.status,
            EntryStatus::Failed | EntryStatus::PermanentlyFailed
        ) {
            return Err(Error::Other(format!(
                "entry {} is {:?}; only failed entries can be discarded",
                client_id, entry.status
            )));
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf_handle(CF_ENTRIES)?, client_id.as_bytes());
        batch.delete_cf(self.cf_handle(CF_ORDER)?, Self::order_key(&entry));
        batch.delete_cf(self.cf_handle(CF_FINGERPRINTS)?, entry.fingerprint.as_bytes());

        self.db.write_opt(batch, &self.durable_write_opts())?;

        tracing::info!(client_id = %client_id, "Entry discarded after review");
        Ok(())
    }

    /// Put a reviewed failed entry back in line with a fresh retry budget
    pub fn requeue(&self, client_id: Uuid) -> Result<OutboxEntry> {
        let mut entry = self.get_entry(client_id)?;

        if !matches!(
            entry.status,
            EntryStatus::Failed | EntryStatus::PermanentlyFailed
        ) {
            return Err(Error::Other(format!(
                "entry {} is {:?}; only failed entries can be requeued",
                client_id, entry.status
            )));
        }

        entry.status = EntryStatus::Pending;
        entry.retry_count = 0;
        entry.requires_ack = false;
        entry.last_error = None;

        let cf = self.cf_handle(CF_ENTRIES)?;
        self.db
            .put_cf(cf, client_id.as_bytes(), bincode::serialize(&entry)?)?;

        tracing::info!(client_id = %client_id, "Entry requeued");
        Ok(entry)
    }

    // Internal lookups

    fn fingerprint_get(&self, fingerprint: &Fingerprint) -> Result<Option<FingerprintRecord>> {
        let cf = self.cf_handle(CF_FINGERPRINTS)?;
        match self.db.get_cf(cf, fingerprint.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn synced_get(&self, client_id: Uuid) -> Result<Option<SyncedLink>> {
        let cf = self.cf_handle(CF_SYNCED)?;
        match self.db.get_cf(cf, client_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn order_key(entry: &OutboxEntry) -> Vec<u8> {
        let mut key = Vec::with_capacity(8 + 16);
        key.extend_from_slice(
            &entry
                .created_at
                .timestamp_nanos_opt()
                .unwrap_or(0)
                .to_be_bytes(),
        );
        key.extend_from_slice(entry.client_id.as_bytes());
        key
    }
}
