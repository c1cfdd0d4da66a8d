//! Settlement Planner
//!
//! Turns derived group balances into the minimal ordered list of transfers
//! that zeroes everyone out.
//!
//! # Pipeline
//!
//! 1. **Balances**: read derived net balances from the ledger
//! 2. **Matching**: greedy largest-creditor / largest-debtor pairing
//! 3. **Recording**: optionally write the plan back as pending payments
//!
//! The matcher produces at most N-1 transfers for N members with non-zero
//! balances and breaks magnitude ties by ascending user id, so output is
//! fully deterministic and safe to assert on.
//!
//! # Example
//!
//! ```no_run
//! use settlement::{Config, SettlementEngine};
//! use std::sync::Arc;
//!
//! fn main() -> settlement::Result<()> {
//!     let store = Arc::new(ledger_core::LedgerStore::open(ledger_core::Config::default())?);
//!     let engine = SettlementEngine::new(store, Config::default());
//!
//!     let group_id = uuid::Uuid::new_v4();
//!     let plan = engine.plan_group_settlement(group_id)?;
//!     println!("{} transfers settle the group", plan.transfers.len());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod config;
pub mod engine;
pub mod error;
pub mod optimizer;
pub mod types;

// Re-exports
pub use config::Config;
pub use engine::SettlementEngine;
pub use error::{Error, Result};
pub use optimizer::SettlementOptimizer;
pub use types::{NetPosition, PaymentLinkProvider, SettlementPlan, Transfer};
