//! Report types for the settlement service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use staking_core::{Amount, ClosureOutcome, ParticipantId, Payout, Seizure, SettlementOutcome};
use uuid::Uuid;

/// Reconciliation record of one settlement batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    /// Batch ID
    pub batch_id: Uuid,

    /// When the batch was committed
    pub executed_at: DateTime<Utc>,

    /// Identity the batch ran under
    pub operator: ParticipantId,

    /// Number of withdrawals paid
    pub payout_count: usize,

    /// Sum of all payouts
    pub total_paid: Amount,

    /// The individual payouts
    pub payouts: Vec<Payout>,
}

impl SettlementReport {
    /// Build a report from the ledger's batch outcome
    pub fn from_outcome(operator: &ParticipantId, outcome: SettlementOutcome) -> Self {
        Self {
            batch_id: outcome.batch_id,
            executed_at: outcome.settled_at,
            operator: operator.clone(),
            payout_count: outcome.payouts.len(),
            total_paid: outcome.total_paid,
            payouts: outcome.payouts,
        }
    }
}

/// Reconciliation record of one forced-closure batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureReport {
    /// Batch ID
    pub batch_id: Uuid,

    /// When the batch was committed
    pub executed_at: DateTime<Utc>,

    /// Identity the batch ran under
    pub operator: ParticipantId,

    /// Recovery address the seized funds were sent to
    pub recovery: ParticipantId,

    /// Number of accounts closed
    pub seizure_count: usize,

    /// Sum of all seizures
    pub total_seized: Amount,

    /// The individual seizures
    pub seizures: Vec<Seizure>,
}

impl ClosureReport {
    /// Build a report from the ledger's batch outcome
    pub fn from_outcome(operator: &ParticipantId, outcome: ClosureOutcome) -> Self {
        Self {
            batch_id: outcome.batch_id,
            executed_at: outcome.closed_at,
            operator: operator.clone(),
            recovery: outcome.recovery,
            seizure_count: outcome.seizures.len(),
            total_seized: outcome.total_seized,
            seizures: outcome.seizures,
        }
    }
}
