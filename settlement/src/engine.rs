//! Settlement orchestration
//!
//! Bridges the ledger store and the optimizer: reads derived balances,
//! computes the transfer plan, and optionally records the plan back into the
//! ledger as pending payments.

use crate::{
    config::Config,
    optimizer::SettlementOptimizer,
    types::{PaymentLinkProvider, SettlementPlan},
    Result,
};
use ledger_core::{LedgerStore, Payment, PaymentDraft};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Settlement engine
pub struct SettlementEngine {
    /// Ledger store (injected, never global)
    store: Arc<LedgerStore>,

    /// Matching algorithm
    optimizer: SettlementOptimizer,
}

impl SettlementEngine {
    /// Create new settlement engine
    pub fn new(store: Arc<LedgerStore>, config: Config) -> Self {
        let epsilon = Decimal::new(i64::from(config.epsilon_minor_units), 2);
        Self {
            store,
            optimizer: SettlementOptimizer::new(epsilon),
        }
    }

    /// Compute the transfer plan that would zero out a group right now
    pub fn plan_group_settlement(&self, group_id: Uuid) -> Result<SettlementPlan> {
        let balances = self.store.group_balances(group_id)?;
        let plan = self.optimizer.settle(&balances);

        tracing::info!(
            group_id = %group_id,
            transfers = plan.transfers.len(),
            total = %plan.total_settled,
            "Settlement planned"
        );

        Ok(plan)
    }

    /// Record a plan's transfers as pending payments in the ledger.
    ///
    /// Completing them (once money actually moves) is the caller's job;
    /// balances only shift when a payment reaches `Completed`.
    pub fn record_settlement_payments(
        &self,
        group_id: Uuid,
        plan: &SettlementPlan,
    ) -> Result<Vec<Payment>> {
        let mut payments = Vec::with_capacity(plan.transfers.len());

        for transfer in &plan.transfers {
            let payment = self.store.create_payment(&PaymentDraft {
                group_id,
                from_user_id: transfer.from,
                to_user_id: transfer.to,
                amount: transfer.amount,
            })?;
            payments.push(payment);
        }

        Ok(payments)
    }

    /// Produce payment links for every transfer in a plan
    pub fn payment_links(
        &self,
        plan: &SettlementPlan,
        provider: &dyn PaymentLinkProvider,
    ) -> Vec<String> {
        plan.transfers
            .iter()
            .map(|transfer| provider.payment_link(transfer))
            .collect()
    }
}
