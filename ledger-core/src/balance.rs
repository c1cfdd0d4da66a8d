//! Balance derivation
//!
//! Net balances are recomputed from ledger state on every read; nothing here
//! is cached or persisted. Positive means the group owes the user, negative
//! means the user owes the group.
//!
//! For each expense the payer is credited `amount - own_share` and every
//! other participant is debited their share; for each completed payment the
//! sender is credited and the receiver debited (paying down debt raises the
//! sender's net balance). Since stored shares sum exactly to each expense
//! amount, balances always sum to exactly zero.

use crate::types::{GroupLedger, PaymentStatus};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Derive net balances for every member of a group.
///
/// Linear in the number of expenses and their participants; no caching
/// needed at this scale.
pub fn compute_balances(ledger: &GroupLedger) -> BTreeMap<Uuid, Decimal> {
    let mut balances: BTreeMap<Uuid, Decimal> = ledger
        .members
        .iter()
        .map(|m| (m.user_id, Decimal::ZERO))
        .collect();

    for entry in &ledger.expenses {
        let payer_id = entry.expense.payer_id;
        let own_share = entry
            .participants
            .iter()
            .find(|p| p.user_id == payer_id)
            .map(|p| p.share_amount)
            .unwrap_or(Decimal::ZERO);

        *balances.entry(payer_id).or_default() += entry.expense.amount - own_share;

        for participant in &entry.participants {
            if participant.user_id != payer_id {
                *balances.entry(participant.user_id).or_default() -= participant.share_amount;
            }
        }
    }

    for payment in &ledger.payments {
        if payment.status == PaymentStatus::Completed {
            *balances.entry(payment.from_user_id).or_default() += payment.amount;
            *balances.entry(payment.to_user_id).or_default() -= payment.amount;
        }
    }

    balances
}

/// Whether every derived balance in the map is exactly zero
pub fn all_zero(balances: &BTreeMap<Uuid, Decimal>) -> bool {
    balances.values().all(|b| b.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Currency, Expense, ExpenseParticipant, ExpenseStatus, ExpenseWithShares, Group,
        GroupMember, GroupStatus, MemberRole, Payment, PaymentStatus, SplitType,
    };
    use chrono::Utc;

    fn ledger_with(
        members: &[Uuid],
        expenses: Vec<ExpenseWithShares>,
        payments: Vec<Payment>,
    ) -> GroupLedger {
        let group_id = expenses
            .first()
            .map(|e| e.expense.group_id)
            .or_else(|| payments.first().map(|p| p.group_id))
            .unwrap_or_else(Uuid::new_v4);

        GroupLedger {
            group: Group {
                group_id,
                name: "trip".to_string(),
                currency: Currency::new("INR"),
                status: GroupStatus::Active,
                created_at: Utc::now(),
            },
            members: members
                .iter()
                .map(|user_id| GroupMember {
                    group_id,
                    user_id: *user_id,
                    role: MemberRole::Member,
                    joined_at: Utc::now(),
                })
                .collect(),
            expenses,
            payments,
        }
    }

    fn equal_expense(group_id: Uuid, payer: Uuid, users: &[Uuid], amount: Decimal) -> ExpenseWithShares {
        let expense = Expense {
            expense_id: Uuid::now_v7(),
            group_id,
            description: "shared".to_string(),
            amount,
            payer_id: payer,
            split_type: SplitType::Equal,
            status: ExpenseStatus::Pending,
            expense_date: Utc::now(),
            created_at: Utc::now(),
        };
        let share = amount / Decimal::from(users.len() as u64);
        let participants = users
            .iter()
            .map(|user_id| ExpenseParticipant {
                expense_id: expense.expense_id,
                user_id: *user_id,
                share_amount: share,
                share_percentage: None,
                is_paid: false,
            })
            .collect();
        ExpenseWithShares {
            expense,
            participants,
        }
    }

    #[test]
    fn test_scenario_equal_split() {
        // 900 paid by A, split equally among A, B, C
        let group_id = Uuid::new_v4();
        let mut users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        users.sort();
        let (a, b, c) = (users[0], users[1], users[2]);

        let ledger = ledger_with(
            &users,
            vec![equal_expense(group_id, a, &users, Decimal::new(90000, 2))],
            vec![],
        );

        let balances = compute_balances(&ledger);
        assert_eq!(balances[&a], Decimal::new(60000, 2));
        assert_eq!(balances[&b], Decimal::new(-30000, 2));
        assert_eq!(balances[&c], Decimal::new(-30000, 2));
        assert_eq!(balances.values().sum::<Decimal>(), Decimal::ZERO);
    }

    #[test]
    fn test_completed_payment_moves_balance() {
        let group_id = Uuid::new_v4();
        let mut users: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        users.sort();
        let (a, b) = (users[0], users[1]);

        let payment = Payment {
            payment_id: Uuid::now_v7(),
            group_id,
            from_user_id: b,
            to_user_id: a,
            amount: Decimal::new(30000, 2),
            status: PaymentStatus::Completed,
            created_at: Utc::now(),
        };

        let ledger = ledger_with(
            &users,
            vec![equal_expense(group_id, a, &users, Decimal::new(60000, 2))],
            vec![payment],
        );

        // A paid 600, B owed 300, B paid 300 back: both zero.
        let balances = compute_balances(&ledger);
        assert_eq!(balances[&a], Decimal::ZERO);
        assert_eq!(balances[&b], Decimal::ZERO);
        assert!(all_zero(&balances));
    }

    #[test]
    fn test_pending_payment_ignored() {
        let group_id = Uuid::new_v4();
        let users: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        let (a, b) = (users[0], users[1]);

        let payment = Payment {
            payment_id: Uuid::now_v7(),
            group_id,
            from_user_id: b,
            to_user_id: a,
            amount: Decimal::new(30000, 2),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
        };

        let ledger = ledger_with(
            &users,
            vec![equal_expense(group_id, a, &users, Decimal::new(60000, 2))],
            vec![payment],
        );

        let balances = compute_balances(&ledger);
        assert_eq!(balances[&a], Decimal::new(30000, 2));
        assert_eq!(balances[&b], Decimal::new(-30000, 2));
    }

    #[test]
    fn test_payer_outside_split_credited_in_full() {
        let group_id = Uuid::new_v4();
        let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let (a, b, c) = (users[0], users[1], users[2]);

        // A pays 100 split between B and C only.
        let mut entry = equal_expense(group_id, a, &[b, c], Decimal::new(10000, 2));
        entry.expense.payer_id = a;

        let ledger = ledger_with(&users, vec![entry], vec![]);
        let balances = compute_balances(&ledger);
        assert_eq!(balances[&a], Decimal::new(10000, 2));
        assert_eq!(balances[&b], Decimal::new(-5000, 2));
        assert_eq!(balances[&c], Decimal::new(-5000, 2));
    }

    #[test]
    fn test_members_without_activity_report_zero() {
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let ledger = ledger_with(&users, vec![], vec![]);

        let balances = compute_balances(&ledger);
        assert_eq!(balances.len(), 4);
        assert!(all_zero(&balances));
    }
}
