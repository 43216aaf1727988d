//! Error types for the staking ledger

use crate::types::{Amount, ParticipantId};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// Every error aborts the entire operation with no partial state change;
/// batch operations are all-or-nothing as well.
#[derive(Error, Debug)]
pub enum Error {
    /// Zero-amount stake or unstake request
    #[error("Amount must be nonzero")]
    InvalidAmount,

    /// Withdrawal request would exceed the staked balance
    #[error("Insufficient stake: pending {pending} + requested {requested} exceeds staked {staked}")]
    InsufficientStake {
        /// Current staked balance
        staked: Amount,
        /// Current pending amount
        pending: Amount,
        /// Amount that was requested
        requested: Amount,
    },

    /// Cancel with nothing pending
    #[error("No pending withdrawal request for {0}")]
    NoPendingRequest(ParticipantId),

    /// Caller-supplied queue index does not reference the expected participant
    #[error("Queue index {index} does not reference participant {participant}")]
    IndexMismatch {
        /// The supplied index hint
        index: usize,
        /// The participant the hint was supposed to reference
        participant: ParticipantId,
    },

    /// Paired batch arrays of unequal length
    #[error("Batch arrays differ in length: {participants} participants vs {hints} index hints")]
    LengthMismatch {
        /// Number of participants supplied
        participants: usize,
        /// Number of index hints supplied
        hints: usize,
    },

    /// Capability check failed
    #[error("Identity {0} lacks the required capability")]
    Unauthorized(ParticipantId),

    /// Custody transfer failed
    #[error("Custody transfer rejected: {0}")]
    TransferRejected(String),

    /// Checked arithmetic overflowed
    #[error("Amount arithmetic overflow")]
    AmountOverflow,

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invariant violation (pending/staked coupling, queue membership, etc.)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}
