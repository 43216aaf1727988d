//! Capability checks
//!
//! The core consumes only the boolean predicate: does this identity hold
//! this role. Role storage and administration live behind the trait, out of
//! the ledger's way.

use crate::{
    error::{Error, Result},
    types::{ParticipantId, Role},
};
use parking_lot::RwLock;
use std::collections::HashSet;

/// Capability predicate consumed by the ledger
pub trait AccessGate: Send + Sync {
    /// True when `actor` holds `role`
    fn has_role(&self, role: Role, actor: &ParticipantId) -> bool;
}

/// In-memory role store: one Owner fixed at construction, Dispensers granted
/// and revoked by the Owner.
#[derive(Debug)]
pub struct RoleRegistry {
    owner: ParticipantId,
    dispensers: RwLock<HashSet<ParticipantId>>,
}

impl RoleRegistry {
    /// Create a registry administered by `owner`
    pub fn new(owner: ParticipantId) -> Self {
        Self {
            owner,
            dispensers: RwLock::new(HashSet::new()),
        }
    }

    /// The administering identity
    pub fn owner(&self) -> &ParticipantId {
        &self.owner
    }

    /// Grant Dispenser to `grantee`; only the Owner may do this
    pub fn grant_dispenser(
        &self,
        actor: &ParticipantId,
        grantee: &ParticipantId,
    ) -> Result<()> {
        if actor != &self.owner {
            return Err(Error::Unauthorized(actor.clone()));
        }
        self.dispensers.write().insert(grantee.clone());
        tracing::info!(grantee = %grantee, "Dispenser capability granted");
        Ok(())
    }

    /// Revoke Dispenser from `grantee`; only the Owner may do this
    pub fn revoke_dispenser(
        &self,
        actor: &ParticipantId,
        grantee: &ParticipantId,
    ) -> Result<()> {
        if actor != &self.owner {
            return Err(Error::Unauthorized(actor.clone()));
        }
        self.dispensers.write().remove(grantee);
        tracing::info!(grantee = %grantee, "Dispenser capability revoked");
        Ok(())
    }
}

impl AccessGate for RoleRegistry {
    fn has_role(&self, role: Role, actor: &ParticipantId) -> bool {
        match role {
            Role::Owner => actor == &self.owner,
            Role::Dispenser => self.dispensers.read().contains(actor),
        }
    }
}
