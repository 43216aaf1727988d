//! Core types for the staking ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (unsigned integer amounts, checked everywhere)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Token amount in the smallest indivisible unit of the custody asset.
pub type Amount = u128;

/// Participant identifier (externally-owned account, custody address, etc.)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create new participant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-participant balances tracked by the ledger.
///
/// Invariant: `pending <= staked` at every observable point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Total staked balance held in custody
    pub staked: Amount,

    /// Amount requested for withdrawal but not yet settled
    pub pending: Amount,
}

impl AccountRecord {
    /// Staked balance minus pending withdrawals; never underflows while the
    /// invariant holds.
    pub fn net_position(&self) -> Amount {
        self.staked.saturating_sub(self.pending)
    }

    /// True once both balances are back to zero
    pub fn is_zero(&self) -> bool {
        self.staked == 0 && self.pending == 0
    }
}

/// Ledger event representing a state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingEvent {
    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// Participant this event belongs to
    pub participant: ParticipantId,

    /// What happened
    pub kind: EventKind,

    /// Event timestamp
    pub recorded_at: DateTime<Utc>,
}

impl StakingEvent {
    /// Create a new event stamped with the current time
    pub fn new(participant: ParticipantId, kind: EventKind) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            participant,
            kind,
            recorded_at: Utc::now(),
        }
    }
}

/// Event kind (state transition), carrying the resulting totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Stake recorded
    StakeRecorded {
        /// Amount deposited
        amount: Amount,
        /// New total staked balance
        total_staked: Amount,
    },
    /// Withdrawal requested
    UnstakeRequested {
        /// Amount requested
        amount: Amount,
        /// New total pending amount
        total_pending: Amount,
    },
    /// Withdrawal request cancelled
    UnstakeCancelled,
    /// Pending withdrawal paid out
    WithdrawalSettled {
        /// Amount paid to the participant
        amount: Amount,
    },
    /// Account forcibly closed
    AccountClosed {
        /// Amount seized to the recovery address
        amount: Amount,
    },
}

/// Capability roles recognized by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Administrator; may also grant and revoke Dispenser
    Owner,
    /// May run settlement and closure batches
    Dispenser,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Dispenser => write!(f, "dispenser"),
        }
    }
}

/// One payout executed during settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Recipient of the payout
    pub participant: ParticipantId,

    /// Amount paid
    pub amount: Amount,
}

/// Result of a settlement batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// Batch ID
    pub batch_id: Uuid,

    /// Payouts executed, in queue order at the time of the call
    pub payouts: Vec<Payout>,

    /// Sum of all payouts
    pub total_paid: Amount,

    /// Batch timestamp
    pub settled_at: DateTime<Utc>,
}

/// One seizure executed during forced closure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seizure {
    /// Closed participant
    pub participant: ParticipantId,

    /// Staked amount redirected to the recovery address
    pub amount: Amount,
}

/// Result of a forced-closure batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureOutcome {
    /// Batch ID
    pub batch_id: Uuid,

    /// Recovery address the seized funds were sent to
    pub recovery: ParticipantId,

    /// Seizures executed, in request order
    pub seizures: Vec<Seizure>,

    /// Sum of all seizures
    pub total_seized: Amount,

    /// Batch timestamp
    pub closed_at: DateTime<Utc>,
}
