//! End-to-end offline-first walkthrough
//!
//! Queues expenses while "disconnected", drains them into an in-process
//! authoritative ledger, then plans and records the settlement transfers
//! that zero the group out.

use anyhow::Result;
use ledger_core::{
    Currency, ExpenseDraft, IdentityProvider, LedgerMutation, LedgerStore, MemberRole, ShareSpec,
    SplitType,
};
use outbox::OutboxStore;
use rust_decimal::Decimal;
use settlement::{PaymentLinkProvider, SettlementEngine, Transfer};
use std::sync::Arc;
use sync_engine::{InProcessRemote, SyncCoordinator, SyncPhase};
use uuid::Uuid;

/// Demo identity: a single signed-in user
struct StaticIdentity {
    user_id: Uuid,
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Uuid {
        self.user_id
    }
}

/// Demo payment links in UPI deep-link shape
struct UpiLinks;

impl PaymentLinkProvider for UpiLinks {
    fn payment_link(&self, transfer: &Transfer) -> String {
        format!(
            "upi://pay?pa={}&am={}&tn=settle-up",
            transfer.to, transfer.amount
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting offline-sync demo");

    let scratch = std::env::temp_dir().join(format!("tally-demo-{}", Uuid::new_v4()));

    // The "server": authoritative ledger store
    let mut ledger_config = ledger_core::Config::default();
    ledger_config.data_dir = scratch.join("ledger");
    let store = Arc::new(LedgerStore::open(ledger_config)?);

    // The "device": durable offline queue
    let mut outbox_config = outbox::Config::default();
    outbox_config.data_dir = scratch.join("outbox");
    let queue = Arc::new(OutboxStore::open(outbox_config)?);

    // Seed users and a group
    let asha = store.create_user("Asha", "asha@example.com")?;
    let bo = store.create_user("Bo", "bo@example.com")?;
    let chen = store.create_user("Chen", "chen@example.com")?;

    let group = store.create_group("Goa trip", Currency::new("INR"), asha.user_id)?;
    store.add_member(group.group_id, bo.user_id, MemberRole::Member)?;
    store.add_member(group.group_id, chen.user_id, MemberRole::Member)?;

    let everyone = [asha.user_id, bo.user_id, chen.user_id];
    let identity = StaticIdentity {
        user_id: asha.user_id,
    };

    // Offline: record expenses into the local queue
    let dinner = ExpenseDraft {
        group_id: group.group_id,
        description: "beach dinner".to_string(),
        amount: Decimal::new(90000, 2),
        payer_id: identity.current_user(),
        split_type: SplitType::Equal,
        expense_date: chrono::Utc::now(),
        shares: everyone.iter().map(|u| ShareSpec::equal(*u)).collect(),
    };
    queue.enqueue(LedgerMutation::CreateExpense(dinner))?;

    let taxi = ExpenseDraft {
        group_id: group.group_id,
        description: "airport taxi".to_string(),
        amount: Decimal::new(30000, 2),
        payer_id: bo.user_id,
        split_type: SplitType::Equal,
        expense_date: chrono::Utc::now(),
        shares: everyone.iter().map(|u| ShareSpec::equal(*u)).collect(),
    };
    queue.enqueue(LedgerMutation::CreateExpense(taxi))?;

    println!("queued offline: {} mutations", queue.counts()?.pending);

    // Connectivity restored: drain the queue
    let remote = Arc::new(InProcessRemote::new(store.clone()));
    let coordinator = Arc::new(SyncCoordinator::new(
        queue.clone(),
        remote,
        sync_engine::Config::default(),
    )?);

    let mut progress = coordinator.subscribe();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            match *progress.borrow() {
                SyncPhase::Draining { processed, total } => {
                    println!("syncing {processed}/{total}");
                }
                SyncPhase::Completed(report) => {
                    println!(
                        "sync finished: {} processed, {} errors",
                        report.processed, report.errors
                    );
                    break;
                }
                SyncPhase::Idle => {}
            }
        }
    });

    let report = coordinator.sync_all().await?;
    watcher.await?;
    anyhow::ensure!(report.errors == 0, "sync reported errors");

    // Balances after sync
    println!("\nbalances:");
    for (user_id, balance) in store.group_balances(group.group_id)? {
        println!("  {user_id}: {balance}");
    }

    // Plan and record the settlement
    let engine = SettlementEngine::new(store.clone(), settlement::Config::default());
    let plan = engine.plan_group_settlement(group.group_id)?;

    println!("\nsettlement plan ({} transfers):", plan.transfers.len());
    for (transfer, link) in plan.transfers.iter().zip(engine.payment_links(&plan, &UpiLinks)) {
        println!("  {} -> {}  {}  ({link})", transfer.from, transfer.to, transfer.amount);
    }

    for payment in engine.record_settlement_payments(group.group_id, &plan)? {
        store.complete_payment(payment.payment_id)?;
    }

    let settled = store.settle_group(group.group_id)?;
    println!("\ngroup '{}' settled: {:?}", settled.name, settled.status);

    let _ = std::fs::remove_dir_all(&scratch);
    Ok(())
}
