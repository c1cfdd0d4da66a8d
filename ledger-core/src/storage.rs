//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `users` - User records (key: user_id)
//! - `groups` - Group records (key: group_id)
//! - `members` - Memberships (key: group_id || user_id)
//! - `expenses` - Expense records (key: expense_id)
//! - `participants` - Expense shares (key: expense_id || user_id)
//! - `payments` - Payment records (key: payment_id)
//! - `indices` - Per-group creation-order indices for expenses and payments
//! - `idempotency` - Client id → canonical id links for replayed submissions

use crate::{
    error::{Error, Result},
    types::{Expense, ExpenseParticipant, Group, GroupMember, Payment, User},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_USERS: &str = "users";
const CF_GROUPS: &str = "groups";
const CF_MEMBERS: &str = "members";
const CF_EXPENSES: &str = "expenses";
const CF_PARTICIPANTS: &str = "participants";
const CF_PAYMENTS: &str = "payments";
const CF_INDICES: &str = "indices";
const CF_IDEMPOTENCY: &str = "idempotency";

/// Index key kind tags
const IDX_EXPENSE: u8 = b'e';
const IDX_PAYMENT: u8 = b'p';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_USERS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_GROUPS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_MEMBERS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_EXPENSES, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_PARTICIPANTS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_PAYMENTS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_IDEMPOTENCY, Self::cf_options_records()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened ledger RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // User operations

    /// Put user record
    pub fn put_user(&self, user: &User) -> Result<()> {
        let cf = self.cf_handle(CF_USERS)?;
        let value = bincode::serialize(user)?;
        self.db.put_cf(cf, user.user_id.as_bytes(), &value)?;
        Ok(())
    }

    /// Get user by ID
    pub fn get_user(&self, user_id: Uuid) -> Result<User> {
        let cf = self.cf_handle(CF_USERS)?;
        let value = self
            .db
            .get_cf(cf, user_id.as_bytes())?
            .ok_or(Error::UserNotFound(user_id))?;
        Ok(bincode::deserialize(&value)?)
    }

    // Group operations

    /// Put group record (create or update)
    pub fn put_group(&self, group: &Group) -> Result<()> {
        let cf = self.cf_handle(CF_GROUPS)?;
        let value = bincode::serialize(group)?;
        self.db.put_cf(cf, group.group_id.as_bytes(), &value)?;
        Ok(())
    }

    /// Get group by ID
    pub fn get_group(&self, group_id: Uuid) -> Result<Group> {
        let cf = self.cf_handle(CF_GROUPS)?;
        let value = self
            .db
            .get_cf(cf, group_id.as_bytes())?
            .ok_or(Error::GroupNotFound(group_id))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Commit group with its founding member (atomic)
    pub fn commit_group(&self, group: &Group, creator: &GroupMember) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_groups = self.cf_handle(CF_GROUPS)?;
        batch.put_cf(cf_groups, group.group_id.as_bytes(), bincode::serialize(group)?);

        let cf_members = self.cf_handle(CF_MEMBERS)?;
        let member_key = Self::member_key(creator.group_id, creator.user_id);
        batch.put_cf(cf_members, &member_key, bincode::serialize(creator)?);

        self.db.write(batch)?;
        Ok(())
    }

    // Membership operations

    /// Put membership record
    pub fn put_member(&self, member: &GroupMember) -> Result<()> {
        let cf = self.cf_handle(CF_MEMBERS)?;
        let key = Self::member_key(member.group_id, member.user_id);
        self.db.put_cf(cf, &key, bincode::serialize(member)?)?;
        Ok(())
    }

    /// Get membership, if present
    pub fn get_member(&self, group_id: Uuid, user_id: Uuid) -> Result<Option<GroupMember>> {
        let cf = self.cf_handle(CF_MEMBERS)?;
        let key = Self::member_key(group_id, user_id);
        match self.db.get_cf(cf, &key)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Get all members of a group
    pub fn get_group_members(&self, group_id: Uuid) -> Result<Vec<GroupMember>> {
        let cf = self.cf_handle(CF_MEMBERS)?;
        let prefix = group_id.as_bytes().to_vec();

        let mut members = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            members.push(bincode::deserialize(&value)?);
        }

        Ok(members)
    }

    // Expense operations

    /// Commit expense, its participant shares, the creation-order index
    /// entry, and (for replayed submissions) the idempotency link, atomically.
    pub fn commit_expense(
        &self,
        expense: &Expense,
        participants: &[ExpenseParticipant],
        idempotency: Option<(Uuid, Uuid)>,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_expenses = self.cf_handle(CF_EXPENSES)?;
        batch.put_cf(
            cf_expenses,
            expense.expense_id.as_bytes(),
            bincode::serialize(expense)?,
        );

        let cf_participants = self.cf_handle(CF_PARTICIPANTS)?;
        for participant in participants {
            let key = Self::participant_key(participant.expense_id, participant.user_id);
            batch.put_cf(cf_participants, &key, bincode::serialize(participant)?);
        }

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key(
            IDX_EXPENSE,
            expense.group_id,
            expense.created_at.timestamp_nanos_opt().unwrap_or(0),
            expense.expense_id,
        );
        batch.put_cf(cf_indices, &idx, []);

        if let Some((client_id, canonical_id)) = idempotency {
            let cf_idem = self.cf_handle(CF_IDEMPOTENCY)?;
            batch.put_cf(cf_idem, client_id.as_bytes(), canonical_id.as_bytes());
        }

        self.db.write(batch)?;

        tracing::debug!(
            expense_id = %expense.expense_id,
            group_id = %expense.group_id,
            participants = participants.len(),
            "Expense committed"
        );

        Ok(())
    }

    /// Get expense by ID
    pub fn get_expense(&self, expense_id: Uuid) -> Result<Expense> {
        let cf = self.cf_handle(CF_EXPENSES)?;
        let value = self
            .db
            .get_cf(cf, expense_id.as_bytes())?
            .ok_or(Error::ExpenseNotFound(expense_id))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Update expense record in place
    pub fn put_expense(&self, expense: &Expense) -> Result<()> {
        let cf = self.cf_handle(CF_EXPENSES)?;
        self.db
            .put_cf(cf, expense.expense_id.as_bytes(), bincode::serialize(expense)?)?;
        Ok(())
    }

    /// Get participant shares of an expense
    pub fn get_expense_participants(&self, expense_id: Uuid) -> Result<Vec<ExpenseParticipant>> {
        let cf = self.cf_handle(CF_PARTICIPANTS)?;
        let prefix = expense_id.as_bytes().to_vec();

        let mut participants = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            participants.push(bincode::deserialize(&value)?);
        }

        Ok(participants)
    }

    /// Get a group's expenses in creation order (via index)
    pub fn get_group_expenses(&self, group_id: Uuid) -> Result<Vec<Expense>> {
        let ids = self.scan_index(IDX_EXPENSE, group_id)?;
        ids.into_iter().map(|id| self.get_expense(id)).collect()
    }

    // Payment operations

    /// Commit payment, its creation-order index entry, and (for replayed
    /// submissions) the idempotency link, atomically.
    pub fn commit_payment(&self, payment: &Payment, idempotency: Option<(Uuid, Uuid)>) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_payments = self.cf_handle(CF_PAYMENTS)?;
        batch.put_cf(
            cf_payments,
            payment.payment_id.as_bytes(),
            bincode::serialize(payment)?,
        );

        let cf_indices = self.cf_handle(CF_INDICES)?;
        let idx = Self::index_key(
            IDX_PAYMENT,
            payment.group_id,
            payment.created_at.timestamp_nanos_opt().unwrap_or(0),
            payment.payment_id,
        );
        batch.put_cf(cf_indices, &idx, []);

        if let Some((client_id, canonical_id)) = idempotency {
            let cf_idem = self.cf_handle(CF_IDEMPOTENCY)?;
            batch.put_cf(cf_idem, client_id.as_bytes(), canonical_id.as_bytes());
        }

        self.db.write(batch)?;

        tracing::debug!(
            payment_id = %payment.payment_id,
            group_id = %payment.group_id,
            "Payment committed"
        );

        Ok(())
    }

    /// Get payment by ID
    pub fn get_payment(&self, payment_id: Uuid) -> Result<Payment> {
        let cf = self.cf_handle(CF_PAYMENTS)?;
        let value = self
            .db
            .get_cf(cf, payment_id.as_bytes())?
            .ok_or(Error::PaymentNotFound(payment_id))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Update payment record in place
    pub fn put_payment(&self, payment: &Payment) -> Result<()> {
        let cf = self.cf_handle(CF_PAYMENTS)?;
        self.db
            .put_cf(cf, payment.payment_id.as_bytes(), bincode::serialize(payment)?)?;
        Ok(())
    }

    /// Get a group's payments in creation order (via index)
    pub fn get_group_payments(&self, group_id: Uuid) -> Result<Vec<Payment>> {
        let ids = self.scan_index(IDX_PAYMENT, group_id)?;
        ids.into_iter().map(|id| self.get_payment(id)).collect()
    }

    // Idempotency operations

    /// Look up the canonical id a client id already materialized
    pub fn idempotency_get(&self, client_id: Uuid) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_IDEMPOTENCY)?;
        match self.db.get_cf(cf, client_id.as_bytes())? {
            Some(value) => {
                let bytes: [u8; 16] = value
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed idempotency record".to_string()))?;
                Ok(Some(Uuid::from_bytes(bytes)))
            }
            None => Ok(None),
        }
    }

    // Settlement close-out

    /// Commit a settled group together with its settled expenses (atomic)
    pub fn commit_group_settled(&self, group: &Group, expenses: &[Expense]) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_groups = self.cf_handle(CF_GROUPS)?;
        batch.put_cf(cf_groups, group.group_id.as_bytes(), bincode::serialize(group)?);

        let cf_expenses = self.cf_handle(CF_EXPENSES)?;
        for expense in expenses {
            batch.put_cf(
                cf_expenses,
                expense.expense_id.as_bytes(),
                bincode::serialize(expense)?,
            );
        }

        self.db.write(batch)?;
        Ok(())
    }

    // Index key helpers

    fn member_key(group_id: Uuid, user_id: Uuid) -> Vec<u8> {
        let mut key = group_id.as_bytes().to_vec();
        key.extend_from_slice(user_id.as_bytes());
        key
    }

    fn participant_key(expense_id: Uuid, user_id: Uuid) -> Vec<u8> {
        let mut key = expense_id.as_bytes().to_vec();
        key.extend_from_slice(user_id.as_bytes());
        key
    }

    fn index_key(kind: u8, group_id: Uuid, created_nanos: i64, id: Uuid) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + 16 + 8 + 16);
        key.push(kind);
        key.extend_from_slice(group_id.as_bytes());
        key.extend_from_slice(&created_nanos.to_be_bytes());
        key.extend_from_slice(id.as_bytes());
        key
    }

    /// Scan an index prefix, returning record ids in key order
    fn scan_index(&self, kind: u8, group_id: Uuid) -> Result<Vec<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;

        let mut prefix = Vec::with_capacity(17);
        prefix.push(kind);
        prefix.extend_from_slice(group_id.as_bytes());

        let mut ids = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            // Record id is the trailing 16 bytes
            if key.len() >= prefix.len() + 8 + 16 {
                let id_bytes: [u8; 16] = key[key.len() - 16..]
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed index key".to_string()))?;
                ids.push(Uuid::from_bytes(id_bytes));
            }
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Currency, ExpenseStatus, GroupStatus, MemberRole, PaymentStatus, SplitType,
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn test_group(group_id: Uuid) -> Group {
        Group {
            group_id,
            name: "trip".to_string(),
            currency: Currency::new("INR"),
            status: GroupStatus::Active,
            created_at: Utc::now(),
        }
    }

    fn test_expense(group_id: Uuid, payer_id: Uuid) -> Expense {
        Expense {
            expense_id: Uuid::now_v7(),
            group_id,
            description: "hotel".to_string(),
            amount: Decimal::new(90000, 2),
            payer_id,
            split_type: SplitType::Equal,
            status: ExpenseStatus::Pending,
            expense_date: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_roundtrip() {
        let (storage, _temp) = test_storage();

        let user = User {
            user_id: Uuid::new_v4(),
            display_name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            created_at: Utc::now(),
        };

        storage.put_user(&user).unwrap();
        let retrieved = storage.get_user(user.user_id).unwrap();
        assert_eq!(retrieved.display_name, "Asha");

        assert!(matches!(
            storage.get_user(Uuid::new_v4()),
            Err(Error::UserNotFound(_))
        ));
    }

    #[test]
    fn test_group_with_creator_atomic() {
        let (storage, _temp) = test_storage();

        let group_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();
        let group = test_group(group_id);
        let creator = GroupMember {
            group_id,
            user_id: creator_id,
            role: MemberRole::Admin,
            joined_at: Utc::now(),
        };

        storage.commit_group(&group, &creator).unwrap();

        let retrieved = storage.get_group(group_id).unwrap();
        assert_eq!(retrieved.name, "trip");

        let members = storage.get_group_members(group_id).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].role, MemberRole::Admin);
    }

    #[test]
    fn test_member_scan_isolated_per_group() {
        let (storage, _temp) = test_storage();

        let group_a = Uuid::new_v4();
        let group_b = Uuid::new_v4();
        for group_id in [group_a, group_b] {
            for _ in 0..2 {
                storage
                    .put_member(&GroupMember {
                        group_id,
                        user_id: Uuid::new_v4(),
                        role: MemberRole::Member,
                        joined_at: Utc::now(),
                    })
                    .unwrap();
            }
        }

        assert_eq!(storage.get_group_members(group_a).unwrap().len(), 2);
        assert_eq!(storage.get_group_members(group_b).unwrap().len(), 2);
    }

    #[test]
    fn test_expense_commit_atomic() {
        let (storage, _temp) = test_storage();

        let group_id = Uuid::new_v4();
        let payer_id = Uuid::new_v4();
        let expense = test_expense(group_id, payer_id);
        let participants = vec![ExpenseParticipant {
            expense_id: expense.expense_id,
            user_id: payer_id,
            share_amount: expense.amount,
            share_percentage: None,
            is_paid: false,
        }];

        storage.commit_expense(&expense, &participants, None).unwrap();

        let retrieved = storage.get_expense(expense.expense_id).unwrap();
        assert_eq!(retrieved.amount, expense.amount);

        let shares = storage.get_expense_participants(expense.expense_id).unwrap();
        assert_eq!(shares.len(), 1);

        let listed = storage.get_group_expenses(group_id).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_group_expenses_creation_order() {
        let (storage, _temp) = test_storage();

        let group_id = Uuid::new_v4();
        let payer_id = Uuid::new_v4();

        let mut expected = Vec::new();
        let base = Utc::now();
        for offset in 0..3 {
            let mut expense = test_expense(group_id, payer_id);
            expense.created_at = base + chrono::Duration::seconds(offset);
            storage.commit_expense(&expense, &[], None).unwrap();
            expected.push(expense.expense_id);
        }

        let listed = storage.get_group_expenses(group_id).unwrap();
        let ids: Vec<Uuid> = listed.iter().map(|e| e.expense_id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_payment_roundtrip_and_update() {
        let (storage, _temp) = test_storage();

        let group_id = Uuid::new_v4();
        let mut payment = Payment {
            payment_id: Uuid::now_v7(),
            group_id,
            from_user_id: Uuid::new_v4(),
            to_user_id: Uuid::new_v4(),
            amount: Decimal::new(30000, 2),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };

        storage.commit_payment(&payment, None).unwrap();

        payment.status = PaymentStatus::Completed;
        storage.put_payment(&payment).unwrap();

        let retrieved = storage.get_payment(payment.payment_id).unwrap();
        assert_eq!(retrieved.status, PaymentStatus::Completed);

        let listed = storage.get_group_payments(group_id).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn test_idempotency_link() {
        let (storage, _temp) = test_storage();

        let group_id = Uuid::new_v4();
        let payer_id = Uuid::new_v4();
        let expense = test_expense(group_id, payer_id);
        let client_id = Uuid::new_v4();

        assert_eq!(storage.idempotency_get(client_id).unwrap(), None);

        storage
            .commit_expense(&expense, &[], Some((client_id, expense.expense_id)))
            .unwrap();

        assert_eq!(
            storage.idempotency_get(client_id).unwrap(),
            Some(expense.expense_id)
        );
    }
}
