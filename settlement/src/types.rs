//! Core types for settlement planning

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single planned transfer: `from` pays `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Debtor (pays)
    pub from: Uuid,

    /// Creditor (receives)
    pub to: Uuid,

    /// Transfer amount (always positive)
    pub amount: Decimal,
}

/// Ordered settlement plan for one group.
///
/// The transfer list is a total ordering, not a set: the same balances always
/// produce the same list in the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementPlan {
    /// Transfers in execution order
    pub transfers: Vec<Transfer>,

    /// Members that entered the plan with a non-zero balance
    pub participant_count: usize,

    /// Sum of all planned transfer amounts
    pub total_settled: Decimal,
}

impl SettlementPlan {
    /// An empty plan (nothing owed)
    pub fn empty() -> Self {
        Self {
            transfers: Vec::new(),
            participant_count: 0,
            total_settled: Decimal::ZERO,
        }
    }

    /// Whether the group was already settled when the plan was computed
    pub fn is_settled(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Upper bound the greedy matching guarantees: N-1 transfers for N
    /// participants with non-zero balances
    pub fn max_transfers(&self) -> usize {
        self.participant_count.saturating_sub(1)
    }
}

/// One member's net position entering settlement
#[derive(Debug, Clone)]
pub struct NetPosition {
    /// Member user ID
    pub user_id: Uuid,

    /// Net balance (positive = creditor, negative = debtor)
    pub balance: Decimal,
}

impl NetPosition {
    /// Check if the member is owed money
    pub fn is_creditor(&self) -> bool {
        self.balance > Decimal::ZERO
    }

    /// Check if the member owes money
    pub fn is_debtor(&self) -> bool {
        self.balance < Decimal::ZERO
    }

    /// Absolute size of the position
    pub fn magnitude(&self) -> Decimal {
        self.balance.abs()
    }
}

/// Payment-link collaborator.
///
/// A pure function from a planned transfer to a link the payer can follow;
/// implemented outside the core (UPI deep links, QR payloads, ...).
pub trait PaymentLinkProvider: Send + Sync {
    /// Produce a payment link for one transfer
    fn payment_link(&self, transfer: &Transfer) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_net_position() {
        let creditor = NetPosition {
            user_id: Uuid::new_v4(),
            balance: Decimal::new(5000, 2),
        };
        assert!(creditor.is_creditor());
        assert!(!creditor.is_debtor());
        assert_eq!(creditor.magnitude(), Decimal::new(5000, 2));

        let debtor = NetPosition {
            user_id: Uuid::new_v4(),
            balance: Decimal::new(-5000, 2),
        };
        assert!(debtor.is_debtor());
        assert_eq!(debtor.magnitude(), Decimal::new(5000, 2));
    }

    #[test]
    fn test_empty_plan() {
        let plan = SettlementPlan::empty();
        assert!(plan.is_settled());
        assert_eq!(plan.max_transfers(), 0);
        assert_eq!(plan.total_settled, Decimal::ZERO);
    }
}
