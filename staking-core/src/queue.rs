//! Pending-withdrawal queue
//!
//! Dense, order-irrelevant set of participants awaiting settlement, backed by
//! an array plus a companion index map from participant to current slot.
//! Insertion appends; removal overwrites the target slot with the last entry
//! and shrinks by one, so both are O(1). Removal reorders the sequence, which
//! is why callers must treat enumeration order as unspecified and why removal
//! by index takes a caller-supplied hint that is validated before use.

use crate::{
    error::{Error, Result},
    types::ParticipantId,
};
use std::collections::HashMap;

/// Outcome of a swap-and-shrink removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEntry {
    /// The participant removed from the queue
    pub participant: ParticipantId,

    /// The participant moved into the vacated slot, if the removed entry was
    /// not already last
    pub moved: Option<ParticipantId>,

    /// Queue length after the removal
    pub new_len: usize,
}

/// Working set of participants with an outstanding withdrawal request.
///
/// Each participant appears at most once.
#[derive(Debug, Clone, Default)]
pub struct WithdrawalQueue {
    slots: Vec<ParticipantId>,
    index: HashMap<ParticipantId, usize>,
}

impl WithdrawalQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from a dense slot vector (storage load path).
    ///
    /// Fails if any participant appears more than once.
    pub fn from_slots(slots: Vec<ParticipantId>) -> Result<Self> {
        let mut index = HashMap::with_capacity(slots.len());
        for (slot, participant) in slots.iter().enumerate() {
            if index.insert(participant.clone(), slot).is_some() {
                return Err(Error::InvariantViolation(format!(
                    "participant {} queued more than once",
                    participant
                )));
            }
        }
        Ok(Self { slots, index })
    }

    /// Number of queued participants
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Membership check
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.index.contains_key(participant)
    }

    /// Current slot of a participant, if queued
    pub fn slot_of(&self, participant: &ParticipantId) -> Option<usize> {
        self.index.get(participant).copied()
    }

    /// Participant at a slot, if in range
    pub fn get(&self, slot: usize) -> Option<&ParticipantId> {
        self.slots.get(slot)
    }

    /// Append a participant, returning its slot.
    ///
    /// Callers guarantee the participant is not already queued (a participant
    /// is enqueued only when its pending amount transitions from zero).
    pub fn insert(&mut self, participant: ParticipantId) -> usize {
        debug_assert!(!self.contains(&participant));
        let slot = self.slots.len();
        self.index.insert(participant.clone(), slot);
        self.slots.push(participant);
        slot
    }

    /// Swap-and-shrink removal of the entry at `slot`.
    ///
    /// Returns `None` when the slot is out of range.
    pub fn remove_slot(&mut self, slot: usize) -> Option<RemovedEntry> {
        if slot >= self.slots.len() {
            return None;
        }

        let last = self.slots.len() - 1;
        let participant = self.slots.swap_remove(slot);
        self.index.remove(&participant);

        let moved = if slot != last {
            let moved = self.slots[slot].clone();
            self.index.insert(moved.clone(), slot);
            Some(moved)
        } else {
            None
        };

        Some(RemovedEntry {
            participant,
            moved,
            new_len: last,
        })
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }

    /// Iterate the current (unordered) contents in slot order
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.slots.iter()
    }

    /// Clone the current contents in slot order
    pub fn snapshot(&self) -> Vec<ParticipantId> {
        self.slots.clone()
    }
}
