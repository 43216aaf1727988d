//! Custody token collaborator
//!
//! The ledger never holds token balances itself; it moves the custody asset
//! through this trait. Both calls either succeed or fail atomically, and a
//! failure aborts the invoking ledger operation without partial effect.

use crate::types::{Amount, ParticipantId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Failure of a custody movement
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Source balance cannot cover the movement
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance {
        /// Balance available at the source
        have: Amount,
        /// Amount that was requested
        need: Amount,
    },

    /// The token ledger refused the movement
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Fungible-token ledger reachable through transfer/transferFrom-style calls
pub trait TokenGateway: Send + Sync {
    /// Pull `amount` from `from` into custody
    fn transfer_from(&self, from: &ParticipantId, amount: Amount)
        -> Result<(), TransferError>;

    /// Pay `amount` out of custody to `to`
    fn transfer(&self, to: &ParticipantId, amount: Amount) -> Result<(), TransferError>;
}

#[derive(Debug, Default)]
struct TokenBook {
    balances: HashMap<ParticipantId, Amount>,
    custody: Amount,
    denied: HashSet<ParticipantId>,
}

/// In-process token ledger for the server binary and tests.
///
/// Tracks per-participant balances plus the custody total, and lets tests
/// deny individual participants to exercise transfer-failure paths.
#[derive(Debug, Default)]
pub struct InMemoryToken {
    book: Mutex<TokenBook>,
}

impl InMemoryToken {
    /// Create an empty token ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a participant out of thin air
    pub fn mint(&self, participant: &ParticipantId, amount: Amount) {
        let mut book = self.book.lock();
        let balance = book.balances.entry(participant.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Current balance of a participant
    pub fn balance_of(&self, participant: &ParticipantId) -> Amount {
        self.book
            .lock()
            .balances
            .get(participant)
            .copied()
            .unwrap_or(0)
    }

    /// Total held in custody
    pub fn custody_balance(&self) -> Amount {
        self.book.lock().custody
    }

    /// Refuse all further movements touching `participant`
    pub fn deny(&self, participant: &ParticipantId) {
        self.book.lock().denied.insert(participant.clone());
    }

    /// Lift a denial
    pub fn allow(&self, participant: &ParticipantId) {
        self.book.lock().denied.remove(participant);
    }
}

impl TokenGateway for InMemoryToken {
    fn transfer_from(
        &self,
        from: &ParticipantId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let mut book = self.book.lock();

        if book.denied.contains(from) {
            return Err(TransferError::Rejected(format!(
                "account {} is denied",
                from
            )));
        }

        let balance = book.balances.get(from).copied().unwrap_or(0);
        if balance < amount {
            return Err(TransferError::InsufficientBalance {
                have: balance,
                need: amount,
            });
        }
        let custody = book
            .custody
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("custody balance overflow".to_string()))?;

        book.balances.insert(from.clone(), balance - amount);
        book.custody = custody;
        Ok(())
    }

    fn transfer(&self, to: &ParticipantId, amount: Amount) -> Result<(), TransferError> {
        let mut book = self.book.lock();

        if book.denied.contains(to) {
            return Err(TransferError::Rejected(format!("account {} is denied", to)));
        }

        if book.custody < amount {
            return Err(TransferError::InsufficientBalance {
                have: book.custody,
                need: amount,
            });
        }
        let balance = book.balances.get(to).copied().unwrap_or(0);
        let balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("recipient balance overflow".to_string()))?;

        book.custody -= amount;
        book.balances.insert(to.clone(), balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> ParticipantId {
        ParticipantId::new(name)
    }

    #[test]
    fn test_round_trip_through_custody() {
        let token = InMemoryToken::new();
        token.mint(&p("alice"), 100);

        token.transfer_from(&p("alice"), 60).unwrap();
        assert_eq!(token.balance_of(&p("alice")), 40);
        assert_eq!(token.custody_balance(), 60);

        token.transfer(&p("alice"), 25).unwrap();
        assert_eq!(token.balance_of(&p("alice")), 65);
        assert_eq!(token.custody_balance(), 35);
    }

    #[test]
    fn test_insufficient_balance() {
        let token = InMemoryToken::new();
        token.mint(&p("alice"), 10);

        let result = token.transfer_from(&p("alice"), 11);
        assert_eq!(
            result,
            Err(TransferError::InsufficientBalance { have: 10, need: 11 })
        );

        let result = token.transfer(&p("alice"), 1);
        assert_eq!(
            result,
            Err(TransferError::InsufficientBalance { have: 0, need: 1 })
        );
    }

    #[test]
    fn test_denied_participant() {
        let token = InMemoryToken::new();
        token.mint(&p("mallory"), 100);
        token.deny(&p("mallory"));

        assert!(token.transfer_from(&p("mallory"), 1).is_err());
        assert!(token.transfer(&p("mallory"), 0).is_err());

        token.allow(&p("mallory"));
        token.transfer_from(&p("mallory"), 1).unwrap();
    }

    #[test]
    fn test_zero_transfers_succeed() {
        let token = InMemoryToken::new();
        token.transfer_from(&p("alice"), 0).unwrap();
        token.transfer(&p("alice"), 0).unwrap();
    }
}
