//! Minimal-transaction settlement matching
//!
//! Implements the greedy cash-flow-minimization heuristic over net balances.
//!
//! # Algorithm
//!
//! 1. Partition members into creditors (balance > 0) and debtors (balance < 0)
//! 2. Match the creditor with the largest remaining credit against the
//!    debtor with the largest remaining debt
//! 3. Transfer `min(credit, |debt|)` and decrement both sides
//! 4. Repeat until every remaining position is within epsilon of zero
//!
//! Each round fully clears at least one side of the match, so the plan never
//! exceeds N-1 transfers for N non-zero positions. The result is not a
//! guaranteed global minimum in pathological cases, but it is deterministic:
//! equal magnitudes are broken by ascending user id.
//!
//! # Example
//!
//! ```text
//! Balances:
//!   A: +600
//!   B: -300
//!   C: -300
//!
//! Plan:
//!   B pays A: 300
//!   C pays A: 300
//! ```

use crate::types::{NetPosition, SettlementPlan, Transfer};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Settlement optimizer
#[derive(Debug, Clone)]
pub struct SettlementOptimizer {
    /// Positions at or below this magnitude count as settled
    epsilon: Decimal,
}

impl SettlementOptimizer {
    /// Create optimizer with an explicit dust threshold
    pub fn new(epsilon: Decimal) -> Self {
        Self { epsilon }
    }

    /// Optimizer that settles down to exact zero
    pub fn with_defaults() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Compute the ordered transfer plan that zeroes the given balances
    pub fn settle(&self, balances: &BTreeMap<Uuid, Decimal>) -> SettlementPlan {
        let mut creditors: Vec<NetPosition> = Vec::new();
        let mut debtors: Vec<NetPosition> = Vec::new();

        for (user_id, balance) in balances {
            let position = NetPosition {
                user_id: *user_id,
                balance: *balance,
            };
            if position.magnitude() <= self.epsilon {
                continue;
            }
            if position.is_creditor() {
                creditors.push(position);
            } else {
                debtors.push(position);
            }
        }

        let participant_count = creditors.len() + debtors.len();

        // Remaining magnitudes, consumed as transfers are emitted
        let mut credits: Vec<(Uuid, Decimal)> = creditors
            .iter()
            .map(|p| (p.user_id, p.magnitude()))
            .collect();
        let mut debts: Vec<(Uuid, Decimal)> =
            debtors.iter().map(|p| (p.user_id, p.magnitude())).collect();

        let mut transfers = Vec::new();
        let mut total_settled = Decimal::ZERO;

        loop {
            let Some(creditor_idx) = Self::select_largest(&credits) else {
                break;
            };
            let Some(debtor_idx) = Self::select_largest(&debts) else {
                break;
            };

            let (creditor_id, credit) = credits[creditor_idx];
            let (debtor_id, debt) = debts[debtor_idx];

            let amount = credit.min(debt);
            transfers.push(Transfer {
                from: debtor_id,
                to: creditor_id,
                amount,
            });
            total_settled += amount;

            credits[creditor_idx].1 -= amount;
            debts[debtor_idx].1 -= amount;

            if credits[creditor_idx].1 <= self.epsilon {
                credits.swap_remove(creditor_idx);
            }
            if debts[debtor_idx].1 <= self.epsilon {
                debts.swap_remove(debtor_idx);
            }
        }

        tracing::debug!(
            participants = participant_count,
            transfers = transfers.len(),
            total = %total_settled,
            "Settlement plan computed"
        );

        SettlementPlan {
            transfers,
            participant_count,
            total_settled,
        }
    }

    /// Index of the largest remaining position; equal magnitudes resolve to
    /// the ascending user id so plans are reproducible
    fn select_largest(positions: &[(Uuid, Decimal)]) -> Option<usize> {
        positions
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(idx, _)| idx)
    }
}

impl Default for SettlementOptimizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted_ids(count: usize) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        ids.sort();
        ids
    }

    fn balances(entries: &[(Uuid, i64)]) -> BTreeMap<Uuid, Decimal> {
        entries
            .iter()
            .map(|(id, cents)| (*id, Decimal::new(*cents, 2)))
            .collect()
    }

    #[test]
    fn test_equal_three_way_scenario() {
        // A paid 900 split three ways: A +600, B -300, C -300
        let ids = sorted_ids(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        let plan = SettlementOptimizer::with_defaults().settle(&balances(&[
            (a, 60000),
            (b, -30000),
            (c, -30000),
        ]));

        assert_eq!(
            plan.transfers,
            vec![
                Transfer {
                    from: b,
                    to: a,
                    amount: Decimal::new(30000, 2)
                },
                Transfer {
                    from: c,
                    to: a,
                    amount: Decimal::new(30000, 2)
                },
            ]
        );
        assert_eq!(plan.participant_count, 3);
        assert!(plan.transfers.len() <= plan.max_transfers());
    }

    #[test]
    fn test_single_pair() {
        let ids = sorted_ids(2);
        let plan = SettlementOptimizer::with_defaults()
            .settle(&balances(&[(ids[0], 12345), (ids[1], -12345)]));

        assert_eq!(plan.transfers.len(), 1);
        assert_eq!(plan.transfers[0].from, ids[1]);
        assert_eq!(plan.transfers[0].to, ids[0]);
        assert_eq!(plan.transfers[0].amount, Decimal::new(12345, 2));
    }

    #[test]
    fn test_all_zero_yields_empty_plan() {
        let ids = sorted_ids(3);
        let plan = SettlementOptimizer::with_defaults()
            .settle(&balances(&[(ids[0], 0), (ids[1], 0), (ids[2], 0)]));

        assert!(plan.is_settled());
        assert_eq!(plan.participant_count, 0);
    }

    #[test]
    fn test_chain_nets_to_two_transfers() {
        // A: -50, B: +20, C: +30 (the classic triangle after netting)
        let ids = sorted_ids(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        let plan = SettlementOptimizer::with_defaults().settle(&balances(&[
            (a, -5000),
            (b, 2000),
            (c, 3000),
        ]));

        // Largest creditor first: A pays C 30, then A pays B 20
        assert_eq!(
            plan.transfers,
            vec![
                Transfer {
                    from: a,
                    to: c,
                    amount: Decimal::new(3000, 2)
                },
                Transfer {
                    from: a,
                    to: b,
                    amount: Decimal::new(2000, 2)
                },
            ]
        );
    }

    #[test]
    fn test_tie_break_by_ascending_user_id() {
        let ids = sorted_ids(4);
        let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

        // Two equal creditors and two equal debtors: the smaller id on each
        // side is matched first.
        let plan = SettlementOptimizer::with_defaults().settle(&balances(&[
            (a, 10000),
            (b, 10000),
            (c, -10000),
            (d, -10000),
        ]));

        assert_eq!(
            plan.transfers,
            vec![
                Transfer {
                    from: c,
                    to: a,
                    amount: Decimal::new(10000, 2)
                },
                Transfer {
                    from: d,
                    to: b,
                    amount: Decimal::new(10000, 2)
                },
            ]
        );
    }

    #[test]
    fn test_deterministic_output() {
        let ids = sorted_ids(5);
        let input = balances(&[
            (ids[0], 70000),
            (ids[1], -20000),
            (ids[2], -10000),
            (ids[3], -25000),
            (ids[4], -15000),
        ]);

        let optimizer = SettlementOptimizer::with_defaults();
        let first = optimizer.settle(&input);
        let second = optimizer.settle(&input);
        assert_eq!(first.transfers, second.transfers);
    }

    #[test]
    fn test_epsilon_ignores_dust() {
        let ids = sorted_ids(2);
        let plan = SettlementOptimizer::new(Decimal::new(1, 2))
            .settle(&balances(&[(ids[0], 1), (ids[1], -1)]));

        assert!(plan.is_settled());
    }
}
