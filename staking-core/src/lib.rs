//! StakeRail Staking Core
//!
//! Custody staking ledger with durable state and per-participant event
//! history.
//!
//! # Architecture
//!
//! - **Single Writer**: One actor task processes every operation to
//!   completion; no two mutating operations ever interleave
//! - **Plan/Commit/Apply**: Each operation resolves its full effect set
//!   before anything is written, so every call is all-or-nothing
//! - **Coupled Structures**: Balances, the pending-withdrawal queue, and
//!   the active-staker registry always land in one atomic write batch
//!
//! # Invariants
//!
//! - `pending <= staked` for every account, at all observable points
//! - A participant appears in the withdrawal queue at most once, and
//!   exactly when its pending amount is nonzero
//! - A participant is registered as a staker exactly when `staked > 0`

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod access;
pub mod actor;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod state;
pub mod storage;
pub mod token;
pub mod types;

// Re-exports
pub use access::{AccessGate, RoleRegistry};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::StakingLedger;
pub use metrics::Metrics;
pub use state::LedgerState;
pub use storage::Storage;
pub use token::{InMemoryToken, TokenGateway, TransferError};
pub use types::{
    AccountRecord, Amount, ClosureOutcome, EventKind, ParticipantId, Payout, Role, Seizure,
    SettlementOutcome, StakingEvent,
};
