//! Core types for the group expense ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque currency label attached to a group (e.g. "INR", "EUR").
///
/// The ledger never converts between currencies; the label travels with the
/// group and is echoed back to callers unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create new currency label
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered user. Immutable identity; created once, referenced by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID (server-assigned)
    pub user_id: Uuid,

    /// Display name
    pub display_name: String,

    /// Email address
    pub email: String,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// Group lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum GroupStatus {
    /// Accepting expenses and payments
    Active = 1,
    /// All balances zeroed and closed out
    Settled = 2,
    /// Read-only archive
    Archived = 3,
}

/// An expense-sharing group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Unique group ID
    pub group_id: Uuid,

    /// Group name
    pub name: String,

    /// Currency label (opaque, no conversion)
    pub currency: Currency,

    /// Lifecycle status
    pub status: GroupStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Whether the group accepts new expenses and payments
    pub fn is_writable(&self) -> bool {
        self.status == GroupStatus::Active
    }
}

/// Membership role within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MemberRole {
    /// Can manage membership and close the group
    Admin = 1,
    /// Regular participant
    Member = 2,
}

/// Membership record linking a user to a group.
///
/// Balances are never stored here: they are derived from the ledger on every
/// read, so there is no cached figure to drift out of date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    /// Group this membership belongs to
    pub group_id: Uuid,

    /// Member user ID
    pub user_id: Uuid,

    /// Role within the group
    pub role: MemberRole,

    /// Joined timestamp
    pub joined_at: DateTime<Utc>,
}

/// How an expense amount is divided among participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SplitType {
    /// Even split across all participants
    Equal = 1,
    /// Per-participant percentage of the total
    Percentage = 2,
    /// Explicit per-participant amounts
    Amount = 3,
    /// Explicit amounts with optional percentage annotations
    Custom = 4,
}

/// Expense lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExpenseStatus {
    /// Recorded, not yet settled
    Pending = 1,
    /// Included in an in-flight settlement
    Processing = 2,
    /// Fully settled
    Settled = 3,
}

impl ExpenseStatus {
    /// Whether `next` is a legal transition from this status
    pub fn can_transition(self, next: ExpenseStatus) -> bool {
        matches!(
            (self, next),
            (ExpenseStatus::Pending, ExpenseStatus::Processing)
                | (ExpenseStatus::Pending, ExpenseStatus::Settled)
                | (ExpenseStatus::Processing, ExpenseStatus::Settled)
        )
    }
}

/// A shared expense paid by one member on behalf of several
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    /// Unique expense ID (UUIDv7, server-assigned)
    pub expense_id: Uuid,

    /// Group this expense belongs to
    pub group_id: Uuid,

    /// Human-readable description
    pub description: String,

    /// Total amount (exact decimal, always positive)
    pub amount: Decimal,

    /// Member who paid
    pub payer_id: Uuid,

    /// How the amount is divided
    pub split_type: SplitType,

    /// Lifecycle status
    pub status: ExpenseStatus,

    /// When the expense occurred
    pub expense_date: DateTime<Utc>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// One participant's slice of an expense.
///
/// Stored shares always sum exactly to the expense amount; sub-cent rounding
/// residue is folded into the payer's share at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseParticipant {
    /// Expense this share belongs to
    pub expense_id: Uuid,

    /// Participant user ID
    pub user_id: Uuid,

    /// Share of the total amount
    pub share_amount: Decimal,

    /// Percentage annotation (percentage/custom splits)
    pub share_percentage: Option<Decimal>,

    /// Whether this share has been paid back
    pub is_paid: bool,
}

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PaymentStatus {
    /// Initiated, not yet confirmed
    Pending = 1,
    /// Confirmed (terminal); only completed payments affect balances
    Completed = 2,
    /// Failed (terminal)
    Failed = 3,
}

impl PaymentStatus {
    /// Whether `next` is a legal transition from this status
    pub fn can_transition(self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }

    /// Check if payment is in terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

/// An executed settlement transfer between two members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment ID (UUIDv7, server-assigned)
    pub payment_id: Uuid,

    /// Group this payment belongs to
    pub group_id: Uuid,

    /// Sender (pays down their debt)
    pub from_user_id: Uuid,

    /// Receiver
    pub to_user_id: Uuid,

    /// Transfer amount
    pub amount: Decimal,

    /// Lifecycle status
    pub status: PaymentStatus,

    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

/// One participant's requested slice in an [`ExpenseDraft`].
///
/// Which fields are required depends on the draft's [`SplitType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSpec {
    /// Participant user ID
    pub user_id: Uuid,

    /// Explicit share amount (amount/custom splits)
    pub amount: Option<Decimal>,

    /// Share percentage (percentage/custom splits)
    pub percentage: Option<Decimal>,
}

impl ShareSpec {
    /// Share spec carrying only a user id (equal splits)
    pub fn equal(user_id: Uuid) -> Self {
        Self {
            user_id,
            amount: None,
            percentage: None,
        }
    }

    /// Share spec carrying an explicit amount
    pub fn amount(user_id: Uuid, amount: Decimal) -> Self {
        Self {
            user_id,
            amount: Some(amount),
            percentage: None,
        }
    }

    /// Share spec carrying a percentage
    pub fn percentage(user_id: Uuid, percentage: Decimal) -> Self {
        Self {
            user_id,
            amount: None,
            percentage: Some(percentage),
        }
    }
}

/// Client-side payload for creating an expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseDraft {
    /// Target group
    pub group_id: Uuid,

    /// Human-readable description
    pub description: String,

    /// Total amount
    pub amount: Decimal,

    /// Member who paid
    pub payer_id: Uuid,

    /// How the amount is divided
    pub split_type: SplitType,

    /// When the expense occurred
    pub expense_date: DateTime<Utc>,

    /// Requested split
    pub shares: Vec<ShareSpec>,
}

/// Client-side payload for creating a payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDraft {
    /// Target group
    pub group_id: Uuid,

    /// Sender
    pub from_user_id: Uuid,

    /// Receiver
    pub to_user_id: Uuid,

    /// Transfer amount
    pub amount: Decimal,
}

/// A write the client wants applied to the ledger.
///
/// Closed set, matched exhaustively everywhere, so sync code never
/// inspects loosely-shaped payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LedgerMutation {
    /// Record a new expense
    CreateExpense(ExpenseDraft),
    /// Record a new payment
    CreatePayment(PaymentDraft),
}

impl LedgerMutation {
    /// Group the mutation targets
    pub fn group_id(&self) -> Uuid {
        match self {
            LedgerMutation::CreateExpense(draft) => draft.group_id,
            LedgerMutation::CreatePayment(draft) => draft.group_id,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerMutation::CreateExpense(_) => "create_expense",
            LedgerMutation::CreatePayment(_) => "create_payment",
        }
    }
}

/// Outcome of an idempotent submission keyed by a client id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitOutcome {
    /// First application; the mutation was materialized
    Created {
        /// Server-assigned id of the new record
        canonical_id: Uuid,
    },
    /// The client id was seen before; nothing was re-applied
    Duplicate {
        /// Id materialized by the original submission
        canonical_id: Uuid,
    },
}

impl SubmitOutcome {
    /// Canonical id regardless of whether this submission applied the write
    pub fn canonical_id(&self) -> Uuid {
        match self {
            SubmitOutcome::Created { canonical_id } | SubmitOutcome::Duplicate { canonical_id } => {
                *canonical_id
            }
        }
    }
}

/// An expense together with its participant shares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseWithShares {
    /// The expense record
    pub expense: Expense,

    /// Participant shares (sum exactly to `expense.amount`)
    pub participants: Vec<ExpenseParticipant>,
}

/// Full ledger state for one group, as returned by
/// [`LedgerStore::get_group_ledger`](crate::LedgerStore::get_group_ledger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupLedger {
    /// The group record
    pub group: Group,

    /// All memberships
    pub members: Vec<GroupMember>,

    /// Expenses in creation order
    pub expenses: Vec<ExpenseWithShares>,

    /// Payments in creation order
    pub payments: Vec<Payment>,
}

/// Identity collaborator supplying the caller's stable user id.
///
/// Authentication itself is out of scope; the core only needs an injected
/// source of "who is acting" so offline drafts carry the right payer.
pub trait IdentityProvider: Send + Sync {
    /// Stable id of the acting user
    fn current_user(&self) -> Uuid;
}
