//! Ledger state and operation planning
//!
//! `LedgerState` holds the three coupled structures: per-participant
//! balances, the pending-withdrawal queue, and the active-staker registry.
//! Every mutating operation is expressed as a [`Plan`]: validation plus a
//! fully resolved effect set computed without touching the state. The actor
//! executes the plan's custody transfers, commits the effect set to storage
//! in one write batch, and only then applies it to memory. A failure at any
//! point therefore discards the operation's entire effect, batch operations
//! included.

use crate::{
    error::{Error, Result},
    queue::WithdrawalQueue,
    registry::StakerRegistry,
    types::{AccountRecord, Amount, EventKind, ParticipantId, StakingEvent},
};
use std::collections::HashMap;

/// A single resolved state mutation.
///
/// Queue mutations carry the slot arithmetic already resolved (which entry
/// moves where), so applying them to memory and mapping them onto storage
/// writes are both mechanical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateOp {
    /// Upsert a participant's balance record
    PutAccount {
        /// Participant whose record changes
        participant: ParticipantId,
        /// The post-operation record
        record: AccountRecord,
    },
    /// Append a participant to the withdrawal queue
    Enqueue {
        /// Participant entering the queue
        participant: ParticipantId,
        /// Slot assigned (the queue length before the append)
        slot: usize,
    },
    /// Swap-and-shrink removal of a queue entry
    DequeueSlot {
        /// Slot being vacated
        slot: usize,
        /// Entry moved into the vacated slot, when the target was not last
        moved: Option<ParticipantId>,
        /// Queue length after the removal
        new_len: usize,
    },
    /// Drop every queue entry
    ClearQueue {
        /// Queue length before the clear
        old_len: usize,
    },
    /// Register an active staker
    AddStaker {
        /// Participant entering the registry
        participant: ParticipantId,
    },
    /// Deregister a staker whose balance reached zero
    RemoveStaker {
        /// Participant leaving the registry
        participant: ParticipantId,
    },
}

/// Custody movement required by a plan, executed before the ledger commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferInstruction {
    /// Pull `amount` from the participant into custody (stake)
    CollectFrom {
        /// Source of the deposit
        participant: ParticipantId,
        /// Amount to collect
        amount: Amount,
    },
    /// Pay `amount` out of custody (settlement payout or seizure)
    PayOut {
        /// Recipient of the payment
        recipient: ParticipantId,
        /// Amount to pay
        amount: Amount,
    },
}

/// Fully resolved effect set of one ledger operation
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// State mutations, in application order
    pub ops: Vec<StateOp>,

    /// Custody transfers, in execution order
    pub transfers: Vec<TransferInstruction>,

    /// Events describing the operation
    pub events: Vec<StakingEvent>,
}

impl Plan {
    /// True when the plan mutates nothing
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.transfers.is_empty() && self.events.is_empty()
    }
}

/// In-memory ledger state, rebuilt from storage at open
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    accounts: HashMap<ParticipantId, AccountRecord>,
    queue: WithdrawalQueue,
    registry: StakerRegistry,
}

impl LedgerState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble from loaded parts (storage load path)
    pub fn from_parts(
        accounts: HashMap<ParticipantId, AccountRecord>,
        queue: WithdrawalQueue,
        registry: StakerRegistry,
    ) -> Self {
        Self {
            accounts,
            queue,
            registry,
        }
    }

    /// Balance record for a participant; zero-valued if never seen
    pub fn account(&self, participant: &ParticipantId) -> AccountRecord {
        self.accounts
            .get(participant)
            .copied()
            .unwrap_or_default()
    }

    /// Staked minus pending; pure read, never fails
    pub fn net_position(&self, participant: &ParticipantId) -> Amount {
        self.account(participant).net_position()
    }

    /// The pending-withdrawal queue
    pub fn queue(&self) -> &WithdrawalQueue {
        &self.queue
    }

    /// The active-staker registry
    pub fn registry(&self) -> &StakerRegistry {
        &self.registry
    }

    // Planning

    /// Plan a stake: custody pull, registry membership, balance increment.
    pub fn plan_stake(&self, participant: &ParticipantId, amount: Amount) -> Result<Plan> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let record = self.account(participant);
        let total_staked = record
            .staked
            .checked_add(amount)
            .ok_or(Error::AmountOverflow)?;

        let mut ops = Vec::new();
        if !self.registry.contains(participant) {
            ops.push(StateOp::AddStaker {
                participant: participant.clone(),
            });
        }
        ops.push(StateOp::PutAccount {
            participant: participant.clone(),
            record: AccountRecord {
                staked: total_staked,
                ..record
            },
        });

        Ok(Plan {
            ops,
            transfers: vec![TransferInstruction::CollectFrom {
                participant: participant.clone(),
                amount,
            }],
            events: vec![StakingEvent::new(
                participant.clone(),
                EventKind::StakeRecorded {
                    amount,
                    total_staked,
                },
            )],
        })
    }

    /// Plan a withdrawal request: pending increment, queue entry when the
    /// pending amount transitions from zero.
    pub fn plan_request_unstake(
        &self,
        participant: &ParticipantId,
        amount: Amount,
    ) -> Result<Plan> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }

        let record = self.account(participant);
        let total_pending = match record.pending.checked_add(amount) {
            Some(total) if total <= record.staked => total,
            _ => {
                return Err(Error::InsufficientStake {
                    staked: record.staked,
                    pending: record.pending,
                    requested: amount,
                })
            }
        };

        let mut ops = Vec::new();
        if record.pending == 0 {
            ops.push(StateOp::Enqueue {
                participant: participant.clone(),
                slot: self.queue.len(),
            });
        }
        ops.push(StateOp::PutAccount {
            participant: participant.clone(),
            record: AccountRecord {
                pending: total_pending,
                ..record
            },
        });

        Ok(Plan {
            ops,
            transfers: vec![],
            events: vec![StakingEvent::new(
                participant.clone(),
                EventKind::UnstakeRequested {
                    amount,
                    total_pending,
                },
            )],
        })
    }

    /// Plan a cancellation: zero the pending amount and remove the queue
    /// entry. The hinted form validates the slot; the unhinted form resolves
    /// it through the index map.
    pub fn plan_cancel_unstake(
        &self,
        participant: &ParticipantId,
        index_hint: Option<usize>,
    ) -> Result<Plan> {
        let record = self.account(participant);
        if record.pending == 0 {
            return Err(Error::NoPendingRequest(participant.clone()));
        }

        let slot = match index_hint {
            Some(index) => {
                if self.queue.get(index) != Some(participant) {
                    return Err(Error::IndexMismatch {
                        index,
                        participant: participant.clone(),
                    });
                }
                index
            }
            None => self.queue.slot_of(participant).ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "participant {} has pending {} but is not queued",
                    participant, record.pending
                ))
            })?,
        };

        let last = self.queue.len() - 1;
        let moved = if slot != last {
            self.queue.get(last).cloned()
        } else {
            None
        };

        Ok(Plan {
            ops: vec![
                StateOp::PutAccount {
                    participant: participant.clone(),
                    record: AccountRecord {
                        pending: 0,
                        ..record
                    },
                },
                StateOp::DequeueSlot {
                    slot,
                    moved,
                    new_len: last,
                },
            ],
            transfers: vec![],
            events: vec![StakingEvent::new(
                participant.clone(),
                EventKind::UnstakeCancelled,
            )],
        })
    }

    /// Plan a settlement batch over the current queue contents.
    ///
    /// Every queued participant is paid its pending amount, its staked
    /// balance is decremented, and the queue is cleared. An empty queue
    /// yields an empty plan.
    pub fn plan_settlement(&self) -> Result<Plan> {
        let mut plan = Plan::default();

        for participant in self.queue.iter() {
            let record = self.accounts.get(participant).copied().ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "queued participant {} has no account record",
                    participant
                ))
            })?;

            let amount = record.pending;
            let staked = record.staked.checked_sub(amount).ok_or_else(|| {
                Error::InvariantViolation(format!(
                    "participant {} pending {} exceeds staked {}",
                    participant, record.pending, record.staked
                ))
            })?;

            plan.ops.push(StateOp::PutAccount {
                participant: participant.clone(),
                record: AccountRecord { staked, pending: 0 },
            });
            if staked == 0 {
                plan.ops.push(StateOp::RemoveStaker {
                    participant: participant.clone(),
                });
            }
            plan.transfers.push(TransferInstruction::PayOut {
                recipient: participant.clone(),
                amount,
            });
            plan.events.push(StakingEvent::new(
                participant.clone(),
                EventKind::WithdrawalSettled { amount },
            ));
        }

        if !self.queue.is_empty() {
            plan.ops.push(StateOp::ClearQueue {
                old_len: self.queue.len(),
            });
        }

        Ok(plan)
    }

    /// Plan a forced-closure batch.
    ///
    /// Pairs are processed in array order against a working copy of the
    /// queue, so a later hint sees the reordering caused by earlier
    /// removals. Each participant's staked balance is seized to the recovery
    /// address and both balances are zeroed.
    pub fn plan_closure(
        &self,
        recovery: &ParticipantId,
        participants: &[ParticipantId],
        index_hints: &[usize],
    ) -> Result<Plan> {
        if participants.len() != index_hints.len() {
            return Err(Error::LengthMismatch {
                participants: participants.len(),
                hints: index_hints.len(),
            });
        }

        let mut plan = Plan::default();
        let mut queue = self.queue.clone();
        let mut touched: HashMap<&ParticipantId, AccountRecord> = HashMap::new();

        for (participant, &hint) in participants.iter().zip(index_hints) {
            let record = touched
                .get(participant)
                .copied()
                .unwrap_or_else(|| self.account(participant));

            if record.pending > 0 {
                if queue.get(hint) != Some(participant) {
                    return Err(Error::IndexMismatch {
                        index: hint,
                        participant: participant.clone(),
                    });
                }
                let removed = queue.remove_slot(hint).ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "queue slot {} vanished while planning closure",
                        hint
                    ))
                })?;
                plan.ops.push(StateOp::DequeueSlot {
                    slot: hint,
                    moved: removed.moved,
                    new_len: removed.new_len,
                });
            }

            let seized = record.staked;
            plan.ops.push(StateOp::PutAccount {
                participant: participant.clone(),
                record: AccountRecord::default(),
            });
            plan.ops.push(StateOp::RemoveStaker {
                participant: participant.clone(),
            });
            plan.transfers.push(TransferInstruction::PayOut {
                recipient: recovery.clone(),
                amount: seized,
            });
            plan.events.push(StakingEvent::new(
                participant.clone(),
                EventKind::AccountClosed { amount: seized },
            ));

            touched.insert(participant, AccountRecord::default());
        }

        Ok(plan)
    }

    // Application

    /// Apply a committed plan's mutations.
    ///
    /// Infallible for plans produced against this state: planners resolve
    /// every slot movement up front, so application is mechanical. Debug
    /// builds assert the resolution still matches.
    pub fn apply(&mut self, ops: &[StateOp]) {
        for op in ops {
            match op {
                StateOp::PutAccount {
                    participant,
                    record,
                } => {
                    self.accounts.insert(participant.clone(), *record);
                }
                StateOp::Enqueue { participant, slot } => {
                    let assigned = self.queue.insert(participant.clone());
                    debug_assert_eq!(assigned, *slot);
                }
                StateOp::DequeueSlot {
                    slot,
                    moved,
                    new_len,
                } => {
                    let removed = self.queue.remove_slot(*slot);
                    debug_assert_eq!(
                        removed.as_ref().map(|r| (&r.moved, r.new_len)),
                        Some((moved, *new_len))
                    );
                }
                StateOp::ClearQueue { old_len } => {
                    debug_assert_eq!(self.queue.len(), *old_len);
                    self.queue.clear();
                }
                StateOp::AddStaker { participant } => {
                    self.registry.add(participant.clone());
                }
                StateOp::RemoveStaker { participant } => {
                    self.registry.remove(participant);
                }
            }
        }
    }

    // Verification

    /// Check the coupling invariants across all three structures.
    ///
    /// Used by tests and the storage load path; the planners preserve these
    /// by construction.
    pub fn check_invariants(&self) -> Result<()> {
        for (participant, record) in &self.accounts {
            if record.pending > record.staked {
                return Err(Error::InvariantViolation(format!(
                    "participant {} pending {} exceeds staked {}",
                    participant, record.pending, record.staked
                )));
            }
            if (record.pending > 0) != self.queue.contains(participant) {
                return Err(Error::InvariantViolation(format!(
                    "participant {} pending {} disagrees with queue membership",
                    participant, record.pending
                )));
            }
            if (record.staked > 0) != self.registry.contains(participant) {
                return Err(Error::InvariantViolation(format!(
                    "participant {} staked {} disagrees with registry membership",
                    participant, record.staked
                )));
            }
        }

        for participant in self.queue.iter() {
            if self.account(participant).pending == 0 {
                return Err(Error::InvariantViolation(format!(
                    "queued participant {} has nothing pending",
                    participant
                )));
            }
        }

        for participant in self.registry.iter() {
            if self.account(participant).staked == 0 {
                return Err(Error::InvariantViolation(format!(
                    "registered staker {} has nothing staked",
                    participant
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> ParticipantId {
        ParticipantId::new(name)
    }

    /// Plan and immediately apply, as the actor does after a commit.
    fn run(state: &mut LedgerState, plan: Plan) -> Plan {
        state.apply(&plan.ops);
        state.check_invariants().unwrap();
        plan
    }

    fn stake(state: &mut LedgerState, name: &str, amount: Amount) {
        let plan = state.plan_stake(&p(name), amount).unwrap();
        run(state, plan);
    }

    fn request_unstake(state: &mut LedgerState, name: &str, amount: Amount) {
        let plan = state.plan_request_unstake(&p(name), amount).unwrap();
        run(state, plan);
    }

    #[test]
    fn test_stake_registers_and_increments() {
        let mut state = LedgerState::new();

        let plan = state.plan_stake(&p("alice"), 100).unwrap();
        assert_eq!(
            plan.transfers,
            vec![TransferInstruction::CollectFrom {
                participant: p("alice"),
                amount: 100,
            }]
        );
        run(&mut state, plan);

        assert_eq!(state.account(&p("alice")).staked, 100);
        assert!(state.registry().contains(&p("alice")));

        // Second stake adds without re-registering
        let plan = state.plan_stake(&p("alice"), 50).unwrap();
        assert!(!plan
            .ops
            .iter()
            .any(|op| matches!(op, StateOp::AddStaker { .. })));
        run(&mut state, plan);
        assert_eq!(state.account(&p("alice")).staked, 150);
    }

    #[test]
    fn test_stake_zero_rejected() {
        let state = LedgerState::new();
        assert!(matches!(
            state.plan_stake(&p("alice"), 0),
            Err(Error::InvalidAmount)
        ));
    }

    #[test]
    fn test_request_unstake_enqueues_once() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);

        request_unstake(&mut state, "alice", 30);
        assert_eq!(state.queue().len(), 1);
        assert_eq!(state.account(&p("alice")).pending, 30);

        // Second request accumulates but does not re-enqueue
        let plan = state.plan_request_unstake(&p("alice"), 30).unwrap();
        assert!(!plan
            .ops
            .iter()
            .any(|op| matches!(op, StateOp::Enqueue { .. })));
        run(&mut state, plan);
        assert_eq!(state.queue().len(), 1);
        assert_eq!(state.account(&p("alice")).pending, 60);
        assert_eq!(state.net_position(&p("alice")), 40);
    }

    #[test]
    fn test_request_unstake_exceeding_stake_rejected() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);
        request_unstake(&mut state, "alice", 30);
        request_unstake(&mut state, "alice", 30);

        // 60 + 50 > 100
        let result = state.plan_request_unstake(&p("alice"), 50);
        assert!(matches!(
            result,
            Err(Error::InsufficientStake {
                staked: 100,
                pending: 60,
                requested: 50,
            })
        ));
    }

    #[test]
    fn test_request_unstake_from_unknown_participant_rejected() {
        let state = LedgerState::new();
        assert!(matches!(
            state.plan_request_unstake(&p("ghost"), 1),
            Err(Error::InsufficientStake { .. })
        ));
    }

    #[test]
    fn test_cancel_unstake_unhinted() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);
        stake(&mut state, "bob", 100);
        request_unstake(&mut state, "alice", 10);
        request_unstake(&mut state, "bob", 20);

        let plan = state.plan_cancel_unstake(&p("alice"), None).unwrap();
        run(&mut state, plan);

        assert_eq!(state.account(&p("alice")).pending, 0);
        assert!(!state.queue().contains(&p("alice")));
        // bob swapped into slot 0
        assert_eq!(state.queue().slot_of(&p("bob")), Some(0));
    }

    #[test]
    fn test_cancel_unstake_hinted() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);
        request_unstake(&mut state, "alice", 10);

        // Wrong hint fails without touching anything
        assert!(matches!(
            state.plan_cancel_unstake(&p("alice"), Some(3)),
            Err(Error::IndexMismatch { index: 3, .. })
        ));

        let plan = state.plan_cancel_unstake(&p("alice"), Some(0)).unwrap();
        run(&mut state, plan);
        assert!(state.queue().is_empty());
    }

    #[test]
    fn test_cancel_without_pending_rejected() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);

        assert!(matches!(
            state.plan_cancel_unstake(&p("alice"), None),
            Err(Error::NoPendingRequest(_))
        ));
    }

    #[test]
    fn test_settlement_pays_and_clears() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);
        stake(&mut state, "bob", 50);
        request_unstake(&mut state, "alice", 40);
        request_unstake(&mut state, "bob", 50);

        let plan = state.plan_settlement().unwrap();
        assert_eq!(plan.transfers.len(), 2);
        run(&mut state, plan);

        // Alice keeps a position, bob is fully out
        assert_eq!(state.account(&p("alice")).staked, 60);
        assert_eq!(state.account(&p("alice")).pending, 0);
        assert!(state.registry().contains(&p("alice")));

        assert!(state.account(&p("bob")).is_zero());
        assert!(!state.registry().contains(&p("bob")));

        assert!(state.queue().is_empty());
    }

    #[test]
    fn test_settlement_of_empty_queue_is_empty_plan() {
        let state = LedgerState::new();
        let plan = state.plan_settlement().unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_closure_seizes_and_reconciles() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);
        stake(&mut state, "bob", 70);
        request_unstake(&mut state, "alice", 25);

        let plan = state
            .plan_closure(&p("recovery"), &[p("alice")], &[0])
            .unwrap();
        assert_eq!(
            plan.transfers,
            vec![TransferInstruction::PayOut {
                recipient: p("recovery"),
                amount: 100,
            }]
        );
        run(&mut state, plan);

        assert!(state.account(&p("alice")).is_zero());
        assert!(!state.registry().contains(&p("alice")));
        assert!(state.queue().is_empty());

        // Bob untouched
        assert_eq!(state.account(&p("bob")).staked, 70);
        assert!(state.registry().contains(&p("bob")));
    }

    #[test]
    fn test_closure_hints_track_earlier_removals() {
        let mut state = LedgerState::new();
        for name in ["a", "b", "c"] {
            stake(&mut state, name, 100);
            request_unstake(&mut state, name, 10);
        }
        // Queue is [a, b, c]. Removing a moves c into slot 0, so closing
        // both a and c uses hints 0 and 0.
        let plan = state
            .plan_closure(&p("recovery"), &[p("a"), p("c")], &[0, 0])
            .unwrap();
        run(&mut state, plan);

        assert_eq!(state.queue().snapshot(), vec![p("b")]);

        // A stale hint that ignores the reordering fails the whole batch
        let mut fresh = LedgerState::new();
        for name in ["a", "b", "c"] {
            stake(&mut fresh, name, 100);
            request_unstake(&mut fresh, name, 10);
        }
        assert!(matches!(
            fresh.plan_closure(&p("recovery"), &[p("a"), p("c")], &[0, 2]),
            Err(Error::IndexMismatch { index: 2, .. })
        ));
    }

    #[test]
    fn test_closure_of_participant_without_pending_skips_queue() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);

        // Hint is ignored when nothing is pending
        let plan = state
            .plan_closure(&p("recovery"), &[p("alice")], &[99])
            .unwrap();
        run(&mut state, plan);
        assert!(state.account(&p("alice")).is_zero());
    }

    #[test]
    fn test_closure_length_mismatch() {
        let state = LedgerState::new();
        assert!(matches!(
            state.plan_closure(&p("recovery"), &[p("a"), p("b")], &[0]),
            Err(Error::LengthMismatch {
                participants: 2,
                hints: 1,
            })
        ));
    }

    #[test]
    fn test_closure_of_unknown_participant_seizes_zero() {
        let state = LedgerState::new();
        let plan = state
            .plan_closure(&p("recovery"), &[p("ghost")], &[0])
            .unwrap();
        assert_eq!(
            plan.transfers,
            vec![TransferInstruction::PayOut {
                recipient: p("recovery"),
                amount: 0,
            }]
        );
    }

    #[test]
    fn test_plans_do_not_mutate_state() {
        let mut state = LedgerState::new();
        stake(&mut state, "alice", 100);
        request_unstake(&mut state, "alice", 40);

        let before_queue = state.queue().snapshot();
        let _ = state.plan_settlement().unwrap();
        let _ = state.plan_cancel_unstake(&p("alice"), None).unwrap();
        let _ = state
            .plan_closure(&p("recovery"), &[p("alice")], &[0])
            .unwrap();

        // Nothing applied, nothing changed
        assert_eq!(state.queue().snapshot(), before_queue);
        assert_eq!(state.account(&p("alice")).pending, 40);
        state.check_invariants().unwrap();
    }
}
