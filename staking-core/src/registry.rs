//! Active-staker registry
//!
//! Enumerable set of participants with a nonzero staked balance. Duplicate
//! `add` and absent `remove` are no-ops: settlement and closure call `remove`
//! when they believe the participant is present but must not fault the whole
//! batch on an inconsistency.

use crate::types::ParticipantId;
use std::collections::HashSet;

/// Set of participants with `staked > 0`
#[derive(Debug, Clone, Default)]
pub struct StakerRegistry {
    members: HashSet<ParticipantId>,
}

impl StakerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored members (storage load path)
    pub fn from_members(members: impl IntoIterator<Item = ParticipantId>) -> Self {
        Self {
            members: members.into_iter().collect(),
        }
    }

    /// Register a participant; returns false if already present
    pub fn add(&mut self, participant: ParticipantId) -> bool {
        self.members.insert(participant)
    }

    /// Deregister a participant; returns false if absent
    pub fn remove(&mut self, participant: &ParticipantId) -> bool {
        self.members.remove(participant)
    }

    /// Membership check
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.members.contains(participant)
    }

    /// Number of active stakers
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when no participant has a nonzero stake
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate current members (unordered)
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.members.iter()
    }

    /// Clone the current members (unordered)
    pub fn snapshot(&self) -> Vec<ParticipantId> {
        self.members.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove_are_idempotent() {
        let mut registry = StakerRegistry::new();
        let alice = ParticipantId::new("alice");

        assert!(registry.add(alice.clone()));
        assert!(!registry.add(alice.clone()));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(&alice));
        assert!(!registry.remove(&alice));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_contains_all_members() {
        let mut registry = StakerRegistry::new();
        registry.add(ParticipantId::new("a"));
        registry.add(ParticipantId::new("b"));

        let mut members = registry.snapshot();
        members.sort();
        assert_eq!(
            members,
            vec![ParticipantId::new("a"), ParticipantId::new("b")]
        );
    }
}
