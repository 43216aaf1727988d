//! Settlement Engine
//!
//! Operations service over the staking ledger's privileged batch calls.
//!
//! # Architecture
//!
//! 1. **Collection**: Read the pending-withdrawal queue from the ledger
//! 2. **Settlement**: Run the atomic settle/close batch under an operator
//!    identity holding the Owner or Dispenser capability
//! 3. **Reporting**: Write one JSON report per batch for reconciliation
//!
//! An optional interval scheduler triggers settlement runs when enough
//! withdrawal requests are queued; the ledger core itself never runs
//! background work.
//!
//! # Example
//!
//! ```no_run
//! use settlement::{Config, SettlementEngine};
//! use staking_core::{InMemoryToken, ParticipantId, RoleRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> settlement::Result<()> {
//!     let config = Config::default();
//!     let token = Arc::new(InMemoryToken::new());
//!     let gate = Arc::new(RoleRegistry::new(ParticipantId::new(
//!         &config.operator_identity,
//!     )));
//!
//!     let engine = SettlementEngine::new(config, token, gate).await?;
//!
//!     // Pay out every pending withdrawal
//!     let report = engine.run_settlement().await?;
//!     println!("Settled {} withdrawals", report.payout_count);
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod engine;
pub mod error;
pub mod report;
pub mod scheduler;
pub mod types;

// Re-exports
pub use config::Config;
pub use engine::SettlementEngine;
pub use error::{Error, Result};
pub use scheduler::SettlementScheduler;
pub use types::{ClosureReport, SettlementReport};
