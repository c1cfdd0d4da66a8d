//! Share computation and the rounding policy
//!
//! Splits an expense amount across participants according to the draft's
//! [`SplitType`]. All shares are rounded to the currency minor unit with
//! round-half-to-even; whatever sub-cent residue the rounding leaves is folded
//! into the payer's share, so stored shares always sum exactly to the expense
//! amount.

use crate::error::ValidationError;
use crate::types::{ExpenseDraft, ShareSpec, SplitType};
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use uuid::Uuid;

/// Decimal places of the currency minor unit.
///
/// The currency label is opaque, so every group settles at two decimal
/// places.
pub const MINOR_UNIT_DP: u32 = 2;

/// Maximum tolerated gap between a stated amount and submitted shares (one
/// minor unit)
pub fn share_tolerance() -> Decimal {
    Decimal::new(1, MINOR_UNIT_DP)
}

/// Round to the currency minor unit with round-half-to-even
pub fn round_to_minor_unit(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_DP, RoundingStrategy::MidpointNearestEven)
}

/// A participant's computed slice of an expense, before the expense id exists
#[derive(Debug, Clone, PartialEq)]
pub struct ShareAllocation {
    /// Participant user ID
    pub user_id: Uuid,

    /// Rounded share amount
    pub amount: Decimal,

    /// Percentage annotation carried through from the draft
    pub percentage: Option<Decimal>,
}

/// Compute the per-participant shares for a draft.
///
/// # Errors
///
/// Rejects empty or duplicated participant lists, non-positive totals,
/// missing per-split fields, percentage sums off 100, and share sums further
/// than one minor unit from the stated amount.
pub fn allocate(draft: &ExpenseDraft) -> Result<Vec<ShareAllocation>, ValidationError> {
    if draft.amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(draft.amount));
    }
    if draft.shares.is_empty() {
        return Err(ValidationError::EmptyParticipants);
    }

    let mut seen = HashSet::new();
    for spec in &draft.shares {
        if !seen.insert(spec.user_id) {
            return Err(ValidationError::DuplicateParticipant(spec.user_id));
        }
    }

    let mut allocations = match draft.split_type {
        SplitType::Equal => allocate_equal(&draft.shares, draft.amount),
        SplitType::Percentage => allocate_percentage(&draft.shares, draft.amount)?,
        SplitType::Amount | SplitType::Custom => allocate_explicit(draft)?,
    };

    distribute_residual(draft.amount, draft.payer_id, &mut allocations)?;

    Ok(allocations)
}

fn allocate_equal(shares: &[ShareSpec], amount: Decimal) -> Vec<ShareAllocation> {
    let count = Decimal::from(shares.len() as u64);
    let per_head = round_to_minor_unit(amount / count);

    shares
        .iter()
        .map(|spec| ShareAllocation {
            user_id: spec.user_id,
            amount: per_head,
            percentage: None,
        })
        .collect()
}

fn allocate_percentage(
    shares: &[ShareSpec],
    amount: Decimal,
) -> Result<Vec<ShareAllocation>, ValidationError> {
    let hundred = Decimal::new(100, 0);

    let mut total_pct = Decimal::ZERO;
    let mut allocations = Vec::with_capacity(shares.len());

    for spec in shares {
        let pct = spec.percentage.ok_or(ValidationError::MissingShare {
            user_id: spec.user_id,
            field: "percentage",
        })?;

        total_pct += pct;
        allocations.push(ShareAllocation {
            user_id: spec.user_id,
            amount: round_to_minor_unit(amount * pct / hundred),
            percentage: Some(pct),
        });
    }

    if (total_pct - hundred).abs() > share_tolerance() {
        return Err(ValidationError::PercentageSumMismatch(total_pct));
    }

    Ok(allocations)
}

fn allocate_explicit(draft: &ExpenseDraft) -> Result<Vec<ShareAllocation>, ValidationError> {
    let mut submitted = Decimal::ZERO;
    let mut allocations = Vec::with_capacity(draft.shares.len());

    for spec in &draft.shares {
        let amount = spec.amount.ok_or(ValidationError::MissingShare {
            user_id: spec.user_id,
            field: "amount",
        })?;

        submitted += amount;
        allocations.push(ShareAllocation {
            user_id: spec.user_id,
            amount: round_to_minor_unit(amount),
            // Custom splits may annotate shares with the percentage they
            // were derived from; plain amount splits carry none.
            percentage: match draft.split_type {
                SplitType::Custom => spec.percentage,
                _ => None,
            },
        });
    }

    if (submitted - draft.amount).abs() > share_tolerance() {
        return Err(ValidationError::ShareSumMismatch {
            stated: draft.amount,
            submitted,
        });
    }

    Ok(allocations)
}

/// Fold the rounding residue into the payer's share (or the lowest user id
/// when the payer holds no share) so the total matches the amount exactly.
fn distribute_residual(
    amount: Decimal,
    payer_id: Uuid,
    allocations: &mut [ShareAllocation],
) -> Result<(), ValidationError> {
    let total: Decimal = allocations.iter().map(|a| a.amount).sum();
    let residual = amount - total;

    if !residual.is_zero() {
        let target = allocations
            .iter()
            .position(|a| a.user_id == payer_id)
            .unwrap_or_else(|| {
                allocations
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, a)| a.user_id)
                    .map(|(idx, _)| idx)
                    .expect("allocations verified non-empty")
            });
        allocations[target].amount += residual;
    }

    for allocation in allocations.iter() {
        if allocation.amount < Decimal::ZERO {
            return Err(ValidationError::NegativeShare {
                user_id: allocation.user_id,
                amount: allocation.amount,
            });
        }
    }

    Ok(())
}
