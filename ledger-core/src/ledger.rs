//! Main ledger orchestration layer
//!
//! Ties storage, share computation, and balance derivation into the
//! high-level write/read API. All writes validate against current group
//! state before anything is persisted, and every multi-key write commits
//! atomically.
//!
//! Writes are serialized per group through a lock registry; readers go
//! straight to storage and never block writers.

use crate::{
    balance,
    error::ValidationError,
    metrics::Metrics,
    shares,
    types::{
        Currency, Expense, ExpenseDraft, ExpenseParticipant, ExpenseStatus, ExpenseWithShares,
        Group, GroupLedger, GroupMember, GroupStatus, LedgerMutation, MemberRole, Payment,
        PaymentDraft, PaymentStatus, SubmitOutcome, User,
    },
    Config, Error, Result, Storage,
};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Authoritative store for users, groups, expenses, and payments
pub struct LedgerStore {
    /// Storage backend
    storage: Arc<Storage>,

    /// Per-group write serialization
    write_locks: DashMap<Uuid, Arc<Mutex<()>>>,

    /// Metrics collector
    metrics: Metrics,
}

impl LedgerStore {
    /// Open ledger store with configuration
    pub fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()?;

        Ok(Self {
            storage,
            write_locks: DashMap::new(),
            metrics,
        })
    }

    /// Metrics collector for this store
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn group_lock(&self, group_id: Uuid) -> Arc<Mutex<()>> {
        self.write_locks
            .entry(group_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // User and group management

    /// Create a user
    pub fn create_user(
        &self,
        display_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<User> {
        let user = User {
            user_id: Uuid::now_v7(),
            display_name: display_name.into(),
            email: email.into(),
            created_at: Utc::now(),
        };

        self.storage.put_user(&user)?;

        tracing::info!(user_id = %user.user_id, "User created");
        Ok(user)
    }

    /// Get user by ID
    pub fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.storage.get_user(user_id)
    }

    /// Create a group; the creator becomes its first admin member
    pub fn create_group(
        &self,
        name: impl Into<String>,
        currency: Currency,
        creator: Uuid,
    ) -> Result<Group> {
        self.storage.get_user(creator)?;

        let group = Group {
            group_id: Uuid::now_v7(),
            name: name.into(),
            currency,
            status: GroupStatus::Active,
            created_at: Utc::now(),
        };
        let member = GroupMember {
            group_id: group.group_id,
            user_id: creator,
            role: MemberRole::Admin,
            joined_at: Utc::now(),
        };

        self.storage.commit_group(&group, &member)?;

        tracing::info!(group_id = %group.group_id, creator = %creator, "Group created");
        Ok(group)
    }

    /// Add a member to a group. Re-adding an existing member returns the
    /// current membership unchanged.
    pub fn add_member(&self, group_id: Uuid, user_id: Uuid, role: MemberRole) -> Result<GroupMember> {
        let lock = self.group_lock(group_id);
        let _guard = lock.lock();

        let group = self.storage.get_group(group_id)?;
        if !group.is_writable() {
            return Err(ValidationError::GroupNotActive(group_id).into());
        }
        self.storage.get_user(user_id)?;

        if let Some(existing) = self.storage.get_member(group_id, user_id)? {
            return Ok(existing);
        }

        let member = GroupMember {
            group_id,
            user_id,
            role,
            joined_at: Utc::now(),
        };
        self.storage.put_member(&member)?;

        tracing::info!(group_id = %group_id, user_id = %user_id, "Member added");
        Ok(member)
    }

    // Writes

    /// Record an expense (online path)
    pub fn create_expense(&self, draft: &ExpenseDraft) -> Result<Expense> {
        let lock = self.group_lock(draft.group_id);
        let _guard = lock.lock();
        self.apply_expense(draft, None)
    }

    /// Record a payment (online path); enters `Pending`
    pub fn create_payment(&self, draft: &PaymentDraft) -> Result<Payment> {
        let lock = self.group_lock(draft.group_id);
        let _guard = lock.lock();
        self.apply_payment(draft, None)
    }

    /// Idempotent submission keyed by a client-generated id.
    ///
    /// A repeated `client_id` does not re-apply the mutation: the already
    /// materialized canonical id is returned as
    /// [`SubmitOutcome::Duplicate`]. The id check and the write happen under
    /// the same group lock, so two racing submissions of one key cannot both
    /// apply.
    pub fn submit(&self, client_id: Uuid, mutation: &LedgerMutation) -> Result<SubmitOutcome> {
        let lock = self.group_lock(mutation.group_id());
        let _guard = lock.lock();

        if let Some(canonical_id) = self.storage.idempotency_get(client_id)? {
            self.metrics.record_duplicate();
            tracing::debug!(
                client_id = %client_id,
                canonical_id = %canonical_id,
                kind = mutation.kind(),
                "Duplicate submission collapsed"
            );
            return Ok(SubmitOutcome::Duplicate { canonical_id });
        }

        let canonical_id = match mutation {
            LedgerMutation::CreateExpense(draft) => {
                self.apply_expense(draft, Some(client_id))?.expense_id
            }
            LedgerMutation::CreatePayment(draft) => {
                self.apply_payment(draft, Some(client_id))?.payment_id
            }
        };

        Ok(SubmitOutcome::Created { canonical_id })
    }

    /// Validate and commit an expense. Caller holds the group write lock.
    fn apply_expense(&self, draft: &ExpenseDraft, client_id: Option<Uuid>) -> Result<Expense> {
        let started = Instant::now();

        let group = self.storage.get_group(draft.group_id)?;
        if !group.is_writable() {
            return Err(ValidationError::GroupNotActive(draft.group_id).into());
        }

        let members: HashSet<Uuid> = self
            .storage
            .get_group_members(draft.group_id)?
            .iter()
            .map(|m| m.user_id)
            .collect();

        if !members.contains(&draft.payer_id) {
            return Err(ValidationError::UnknownParticipant(draft.payer_id).into());
        }
        for spec in &draft.shares {
            if !members.contains(&spec.user_id) {
                return Err(ValidationError::UnknownParticipant(spec.user_id).into());
            }
        }

        let allocations = shares::allocate(draft)?;

        let expense = Expense {
            expense_id: Uuid::now_v7(),
            group_id: draft.group_id,
            description: draft.description.clone(),
            amount: draft.amount,
            payer_id: draft.payer_id,
            split_type: draft.split_type,
            status: ExpenseStatus::Pending,
            expense_date: draft.expense_date,
            created_at: Utc::now(),
        };

        let participants: Vec<ExpenseParticipant> = allocations
            .into_iter()
            .map(|allocation| ExpenseParticipant {
                expense_id: expense.expense_id,
                user_id: allocation.user_id,
                share_amount: allocation.amount,
                share_percentage: allocation.percentage,
                // The payer's own slice needs no repayment
                is_paid: allocation.user_id == draft.payer_id,
            })
            .collect();

        self.storage.commit_expense(
            &expense,
            &participants,
            client_id.map(|c| (c, expense.expense_id)),
        )?;

        self.metrics.record_expense();
        self.metrics
            .record_write_duration(started.elapsed().as_secs_f64());

        tracing::info!(
            expense_id = %expense.expense_id,
            group_id = %expense.group_id,
            amount = %expense.amount,
            "Expense recorded"
        );

        Ok(expense)
    }

    /// Validate and commit a payment. Caller holds the group write lock.
    fn apply_payment(&self, draft: &PaymentDraft, client_id: Option<Uuid>) -> Result<Payment> {
        let started = Instant::now();

        if draft.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(draft.amount).into());
        }
        if draft.from_user_id == draft.to_user_id {
            return Err(ValidationError::SelfPayment(draft.from_user_id).into());
        }

        let group = self.storage.get_group(draft.group_id)?;
        if !group.is_writable() {
            return Err(ValidationError::GroupNotActive(draft.group_id).into());
        }

        for user_id in [draft.from_user_id, draft.to_user_id] {
            if self.storage.get_member(draft.group_id, user_id)?.is_none() {
                return Err(ValidationError::UnknownParticipant(user_id).into());
            }
        }

        let payment = Payment {
            payment_id: Uuid::now_v7(),
            group_id: draft.group_id,
            from_user_id: draft.from_user_id,
            to_user_id: draft.to_user_id,
            amount: draft.amount,
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };

        self.storage
            .commit_payment(&payment, client_id.map(|c| (c, payment.payment_id)))?;

        self.metrics.record_payment();
        self.metrics
            .record_write_duration(started.elapsed().as_secs_f64());

        tracing::info!(
            payment_id = %payment.payment_id,
            group_id = %payment.group_id,
            amount = %payment.amount,
            "Payment recorded"
        );

        Ok(payment)
    }

    /// Mark a pending payment completed
    pub fn complete_payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.transition_payment(payment_id, PaymentStatus::Completed)
    }

    /// Mark a pending payment failed
    pub fn fail_payment(&self, payment_id: Uuid) -> Result<Payment> {
        self.transition_payment(payment_id, PaymentStatus::Failed)
    }

    fn transition_payment(&self, payment_id: Uuid, next: PaymentStatus) -> Result<Payment> {
        let group_id = self.storage.get_payment(payment_id)?.group_id;
        let lock = self.group_lock(group_id);
        let _guard = lock.lock();

        // Reload under the lock; the first read only located the group.
        let mut payment = self.storage.get_payment(payment_id)?;
        if !payment.status.can_transition(next) {
            return Err(Error::InvalidTransition(format!(
                "payment {} cannot move {:?} -> {:?}",
                payment_id, payment.status, next
            )));
        }

        payment.status = next;
        self.storage.put_payment(&payment)?;

        tracing::info!(payment_id = %payment_id, status = ?next, "Payment transitioned");
        Ok(payment)
    }

    // Reads

    /// Full ledger state for a group: members, expenses with shares, and
    /// payments, each in creation order
    pub fn get_group_ledger(&self, group_id: Uuid) -> Result<GroupLedger> {
        let group = self.storage.get_group(group_id)?;
        let members = self.storage.get_group_members(group_id)?;

        let expenses = self
            .storage
            .get_group_expenses(group_id)?
            .into_iter()
            .map(|expense| {
                let participants = self.storage.get_expense_participants(expense.expense_id)?;
                Ok(ExpenseWithShares {
                    expense,
                    participants,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let payments = self.storage.get_group_payments(group_id)?;

        Ok(GroupLedger {
            group,
            members,
            expenses,
            payments,
        })
    }

    /// Derived net balances for a group (recomputed on every call)
    pub fn group_balances(&self, group_id: Uuid) -> Result<BTreeMap<Uuid, Decimal>> {
        let ledger = self.get_group_ledger(group_id)?;
        Ok(balance::compute_balances(&ledger))
    }

    /// Close out a fully balanced group: the group and its expenses move to
    /// `Settled`. Rejected while any member still carries a balance.
    pub fn settle_group(&self, group_id: Uuid) -> Result<Group> {
        let lock = self.group_lock(group_id);
        let _guard = lock.lock();

        let ledger = self.get_group_ledger(group_id)?;
        if ledger.group.status != GroupStatus::Active {
            return Err(ValidationError::GroupNotActive(group_id).into());
        }

        let balances = balance::compute_balances(&ledger);
        if !balance::all_zero(&balances) {
            return Err(Error::InvalidTransition(format!(
                "group {} has outstanding balances",
                group_id
            )));
        }

        let mut group = ledger.group;
        group.status = GroupStatus::Settled;

        let expenses: Vec<Expense> = ledger
            .expenses
            .into_iter()
            .filter(|e| e.expense.status.can_transition(ExpenseStatus::Settled))
            .map(|e| {
                let mut expense = e.expense;
                expense.status = ExpenseStatus::Settled;
                expense
            })
            .collect();

        self.storage.commit_group_settled(&group, &expenses)?;

        tracing::info!(group_id = %group_id, "Group settled");
        Ok(group)
    }
}
