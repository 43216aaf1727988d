//! Actor-based concurrency for the ledger
//!
//! This module implements the single-writer pattern using Tokio actors: one
//! logical writer task owns the ledger state and processes every operation
//! to completion (success or full rollback) before starting the next. The
//! coupling invariants between balances, the withdrawal queue, and the
//! staker registry are proven only under this serial model, so nothing else
//! in the crate mutates state.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerHandle (Clone)                     │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │             LedgerActor (Single Task)                 │
//! │                                                       │
//! │   plan (validate, resolve effects)                    │
//! │     → token transfers                                 │
//! │       → Storage::commit (one WriteBatch)              │
//! │         → LedgerState::apply (infallible)             │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    metrics::Metrics,
    state::{LedgerState, Plan, TransferInstruction},
    token::{TokenGateway, TransferError},
    types::{
        AccountRecord, Amount, ClosureOutcome, EventKind, ParticipantId, Payout, Seizure,
        SettlementOutcome, StakingEvent,
    },
    Error, Result, Storage,
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Record a stake deposit
    Stake {
        /// Depositing participant
        participant: ParticipantId,
        /// Amount to stake
        amount: Amount,
        /// Reports the new total staked balance
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Request a withdrawal
    RequestUnstake {
        /// Requesting participant
        participant: ParticipantId,
        /// Amount to withdraw
        amount: Amount,
        /// Reports the new total pending amount
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Cancel a pending withdrawal request
    CancelUnstake {
        /// Cancelling participant
        participant: ParticipantId,
        /// Optional queue slot hint for O(1) removal
        index_hint: Option<usize>,
        /// Completion signal
        response: oneshot::Sender<Result<()>>,
    },

    /// Settle every pending withdrawal
    Settle {
        /// Reports the executed payouts
        response: oneshot::Sender<Result<SettlementOutcome>>,
    },

    /// Forcibly close the listed accounts
    CloseAccounts {
        /// Recovery address receiving seized funds
        recovery: ParticipantId,
        /// Accounts to close, in order
        participants: Vec<ParticipantId>,
        /// Queue slot hints paired with `participants`
        index_hints: Vec<usize>,
        /// Reports the executed seizures
        response: oneshot::Sender<Result<ClosureOutcome>>,
    },

    /// Read staked minus pending
    NetPosition {
        /// Queried participant
        participant: ParticipantId,
        /// Reports the net position
        response: oneshot::Sender<Result<Amount>>,
    },

    /// Read a balance record
    GetAccount {
        /// Queried participant
        participant: ParticipantId,
        /// Reports the record (zero-valued if never seen)
        response: oneshot::Sender<Result<AccountRecord>>,
    },

    /// Enumerate active stakers (unordered)
    ListStakers {
        /// Reports the current registry contents
        response: oneshot::Sender<Result<Vec<ParticipantId>>>,
    },

    /// Enumerate queued withdrawal requesters (unordered)
    ListPendingWithdrawals {
        /// Reports the current queue contents
        response: oneshot::Sender<Result<Vec<ParticipantId>>>,
    },

    /// Shutdown actor
    Shutdown {
        /// Acknowledged only after the actor released its storage handle,
        /// so the database can be reopened immediately afterwards
        response: oneshot::Sender<()>,
    },
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Authoritative in-memory state
    state: LedgerState,

    /// Storage backend
    storage: Arc<Storage>,

    /// Custody token collaborator
    token: Arc<dyn TokenGateway>,

    /// Metrics collector
    metrics: Metrics,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        state: LedgerState,
        storage: Arc<Storage>,
        token: Arc<dyn TokenGateway>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            state,
            storage,
            token,
            metrics,
            mailbox,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let ack = loop {
            match self.mailbox.recv().await {
                Some(LedgerMessage::Shutdown { response }) => break Some(response),
                Some(msg) => self.handle_message(msg),
                None => break None,
            }
        };

        // Release state and the storage handle before acknowledging
        drop(self);
        tracing::info!("Ledger actor stopped");

        if let Some(response) = ack {
            let _ = response.send(());
        }
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::Stake {
                participant,
                amount,
                response,
            } => {
                let _ = response.send(self.stake(&participant, amount));
            }

            LedgerMessage::RequestUnstake {
                participant,
                amount,
                response,
            } => {
                let _ = response.send(self.request_unstake(&participant, amount));
            }

            LedgerMessage::CancelUnstake {
                participant,
                index_hint,
                response,
            } => {
                let _ = response.send(self.cancel_unstake(&participant, index_hint));
            }

            LedgerMessage::Settle { response } => {
                let _ = response.send(self.settle());
            }

            LedgerMessage::CloseAccounts {
                recovery,
                participants,
                index_hints,
                response,
            } => {
                let _ = response.send(self.close_accounts(&recovery, &participants, &index_hints));
            }

            LedgerMessage::NetPosition {
                participant,
                response,
            } => {
                let _ = response.send(Ok(self.state.net_position(&participant)));
            }

            LedgerMessage::GetAccount {
                participant,
                response,
            } => {
                let _ = response.send(Ok(self.state.account(&participant)));
            }

            LedgerMessage::ListStakers { response } => {
                let _ = response.send(Ok(self.state.registry().snapshot()));
            }

            LedgerMessage::ListPendingWithdrawals { response } => {
                let _ = response.send(Ok(self.state.queue().snapshot()));
            }

            LedgerMessage::Shutdown { .. } => {
                // Handled in main loop
            }
        }
    }

    /// Execute a plan: transfers first, then the atomic storage commit,
    /// then the infallible in-memory application. A failure at any point
    /// leaves the ledger untouched; custody movements already executed in a
    /// failed batch are compensated with reverse transfers.
    fn execute(&mut self, plan: &Plan) -> Result<()> {
        let mut executed: Vec<&TransferInstruction> = Vec::new();
        for transfer in &plan.transfers {
            if let Err(e) = self.perform(transfer) {
                self.compensate(&executed);
                return Err(Error::TransferRejected(e.to_string()));
            }
            executed.push(transfer);
        }

        self.storage.commit(plan)?;
        self.state.apply(&plan.ops);
        self.refresh_gauges();

        Ok(())
    }

    fn perform(&self, transfer: &TransferInstruction) -> std::result::Result<(), TransferError> {
        match transfer {
            TransferInstruction::CollectFrom {
                participant,
                amount,
            } => self.token.transfer_from(participant, *amount),
            TransferInstruction::PayOut { recipient, amount } => {
                self.token.transfer(recipient, *amount)
            }
        }
    }

    /// Reverse already-executed custody movements of a failed batch, newest
    /// first. A compensation that itself fails is logged and skipped; the
    /// ledger state was never touched either way.
    fn compensate(&self, executed: &[&TransferInstruction]) {
        for transfer in executed.iter().rev() {
            let result = match transfer {
                TransferInstruction::CollectFrom {
                    participant,
                    amount,
                } => self.token.transfer(participant, *amount),
                TransferInstruction::PayOut { recipient, amount } => {
                    self.token.transfer_from(recipient, *amount)
                }
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to compensate custody movement");
            }
        }
    }

    fn stake(&mut self, participant: &ParticipantId, amount: Amount) -> Result<Amount> {
        let plan = self.state.plan_stake(participant, amount)?;
        self.execute(&plan)?;
        self.metrics.stakes_total.inc();

        let total_staked = self.state.account(participant).staked;
        tracing::debug!(participant = %participant, amount, total_staked = %total_staked, "Stake recorded");
        Ok(total_staked)
    }

    fn request_unstake(&mut self, participant: &ParticipantId, amount: Amount) -> Result<Amount> {
        let plan = self.state.plan_request_unstake(participant, amount)?;
        self.execute(&plan)?;
        self.metrics.unstake_requests_total.inc();

        let total_pending = self.state.account(participant).pending;
        tracing::debug!(participant = %participant, amount, total_pending = %total_pending, "Unstake requested");
        Ok(total_pending)
    }

    fn cancel_unstake(
        &mut self,
        participant: &ParticipantId,
        index_hint: Option<usize>,
    ) -> Result<()> {
        let plan = self.state.plan_cancel_unstake(participant, index_hint)?;
        self.execute(&plan)?;
        self.metrics.unstake_cancellations_total.inc();

        tracing::debug!(participant = %participant, "Unstake cancelled");
        Ok(())
    }

    fn settle(&mut self) -> Result<SettlementOutcome> {
        let plan = self.state.plan_settlement()?;
        let payouts = payouts_of(&plan.events);

        self.execute(&plan)?;
        self.metrics.settlement_batches_total.inc();
        self.metrics
            .settlement_batch_size
            .observe(payouts.len() as f64);

        let outcome = SettlementOutcome {
            batch_id: Uuid::new_v4(),
            total_paid: payouts
                .iter()
                .fold(0, |acc: Amount, p| acc.saturating_add(p.amount)),
            payouts,
            settled_at: Utc::now(),
        };

        tracing::info!(
            batch_id = %outcome.batch_id,
            payouts = outcome.payouts.len(),
            total_paid = %outcome.total_paid,
            "Settlement batch committed"
        );

        Ok(outcome)
    }

    fn close_accounts(
        &mut self,
        recovery: &ParticipantId,
        participants: &[ParticipantId],
        index_hints: &[usize],
    ) -> Result<ClosureOutcome> {
        let plan = self
            .state
            .plan_closure(recovery, participants, index_hints)?;
        let seizures = seizures_of(&plan.events);

        self.execute(&plan)?;
        self.metrics.closure_batches_total.inc();

        let outcome = ClosureOutcome {
            batch_id: Uuid::new_v4(),
            recovery: recovery.clone(),
            total_seized: seizures
                .iter()
                .fold(0, |acc: Amount, s| acc.saturating_add(s.amount)),
            seizures,
            closed_at: Utc::now(),
        };

        tracing::info!(
            batch_id = %outcome.batch_id,
            recovery = %outcome.recovery,
            seizures = outcome.seizures.len(),
            total_seized = %outcome.total_seized,
            "Closure batch committed"
        );

        Ok(outcome)
    }

    fn refresh_gauges(&self) {
        self.metrics
            .queue_depth
            .set(self.state.queue().len() as i64);
        self.metrics
            .active_stakers
            .set(self.state.registry().len() as i64);
    }
}

fn payouts_of(events: &[StakingEvent]) -> Vec<Payout> {
    events
        .iter()
        .filter_map(|event| match event.kind {
            EventKind::WithdrawalSettled { amount } => Some(Payout {
                participant: event.participant.clone(),
                amount,
            }),
            _ => None,
        })
        .collect()
}

fn seizures_of(events: &[StakingEvent]) -> Vec<Seizure> {
    events
        .iter()
        .filter_map(|event| match event.kind {
            EventKind::AccountClosed { amount } => Some(Seizure {
                participant: event.participant.clone(),
                amount,
            }),
            _ => None,
        })
        .collect()
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn call<T>(
        &self,
        msg: LedgerMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Record a stake deposit; reports the new total staked balance
    pub async fn stake(&self, participant: ParticipantId, amount: Amount) -> Result<Amount> {
        let (tx, rx) = oneshot::channel();
        self.call(
            LedgerMessage::Stake {
                participant,
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Request a withdrawal; reports the new total pending amount
    pub async fn request_unstake(
        &self,
        participant: ParticipantId,
        amount: Amount,
    ) -> Result<Amount> {
        let (tx, rx) = oneshot::channel();
        self.call(
            LedgerMessage::RequestUnstake {
                participant,
                amount,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Cancel a pending withdrawal request
    pub async fn cancel_unstake(
        &self,
        participant: ParticipantId,
        index_hint: Option<usize>,
    ) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.call(
            LedgerMessage::CancelUnstake {
                participant,
                index_hint,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Settle every pending withdrawal
    pub async fn settle(&self) -> Result<SettlementOutcome> {
        let (tx, rx) = oneshot::channel();
        self.call(LedgerMessage::Settle { response: tx }, rx).await
    }

    /// Forcibly close the listed accounts
    pub async fn close_accounts(
        &self,
        recovery: ParticipantId,
        participants: Vec<ParticipantId>,
        index_hints: Vec<usize>,
    ) -> Result<ClosureOutcome> {
        let (tx, rx) = oneshot::channel();
        self.call(
            LedgerMessage::CloseAccounts {
                recovery,
                participants,
                index_hints,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Read staked minus pending
    pub async fn net_position(&self, participant: ParticipantId) -> Result<Amount> {
        let (tx, rx) = oneshot::channel();
        self.call(
            LedgerMessage::NetPosition {
                participant,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Read a balance record
    pub async fn account(&self, participant: ParticipantId) -> Result<AccountRecord> {
        let (tx, rx) = oneshot::channel();
        self.call(
            LedgerMessage::GetAccount {
                participant,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Enumerate active stakers (unordered)
    pub async fn stakers(&self) -> Result<Vec<ParticipantId>> {
        let (tx, rx) = oneshot::channel();
        self.call(LedgerMessage::ListStakers { response: tx }, rx)
            .await
    }

    /// Enumerate queued withdrawal requesters (unordered)
    pub async fn pending_withdrawals(&self) -> Result<Vec<ParticipantId>> {
        let (tx, rx) = oneshot::channel();
        self.call(LedgerMessage::ListPendingWithdrawals { response: tx }, rx)
            .await
    }

    /// Shutdown actor and wait for it to release its resources
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(LedgerMessage::Shutdown { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    state: LedgerState,
    storage: Arc<Storage>,
    token: Arc<dyn TokenGateway>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(state, storage, token, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
