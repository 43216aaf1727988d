//! Main ledger orchestration layer
//!
//! This module ties together storage, state, and actor components into a
//! high-level API for staking operations.
//!
//! # Example
//!
//! ```no_run
//! use staking_core::{Config, InMemoryToken, ParticipantId, RoleRegistry, StakingLedger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> staking_core::Result<()> {
//!     let config = Config::default();
//!     let token = Arc::new(InMemoryToken::new());
//!     let gate = Arc::new(RoleRegistry::new(ParticipantId::new(&config.owner_identity)));
//!
//!     let ledger = StakingLedger::open(config, token.clone(), gate).await?;
//!
//!     let alice = ParticipantId::new("alice");
//!     token.mint(&alice, 1_000);
//!     ledger.stake(&alice, 400).await?;
//!     ledger.request_unstake(&alice, 100).await?;
//!
//!     ledger.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::{
    access::AccessGate,
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    token::TokenGateway,
    types::{
        AccountRecord, Amount, ClosureOutcome, ParticipantId, Role, SettlementOutcome,
        StakingEvent,
    },
    Config, Error, Result, Storage,
};
use std::sync::Arc;

/// Main staking ledger interface
pub struct StakingLedger {
    /// Actor handle for serialized operations
    handle: LedgerHandle,

    /// Direct storage access (for event history reads)
    storage: Arc<Storage>,

    /// Capability predicate for privileged batch operations
    gate: Arc<dyn AccessGate>,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl StakingLedger {
    /// Open the ledger: load persisted state, verify its invariants, and
    /// spawn the single-writer actor.
    pub async fn open(
        config: Config,
        token: Arc<dyn TokenGateway>,
        gate: Arc<dyn AccessGate>,
    ) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let state = storage.load_state()?;

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;
        metrics.queue_depth.set(state.queue().len() as i64);
        metrics.active_stakers.set(state.registry().len() as i64);

        let handle = spawn_ledger_actor(
            state,
            storage.clone(),
            token,
            metrics.clone(),
            config.mailbox_capacity,
        );

        Ok(Self {
            handle,
            storage,
            gate,
            metrics,
            config,
        })
    }

    /// Stake `amount` on behalf of `participant`.
    ///
    /// Pulls the amount into custody first; reports the new total staked
    /// balance.
    pub async fn stake(&self, participant: &ParticipantId, amount: Amount) -> Result<Amount> {
        self.handle.stake(participant.clone(), amount).await
    }

    /// Request withdrawal of `amount`; reports the new total pending amount.
    pub async fn request_unstake(
        &self,
        participant: &ParticipantId,
        amount: Amount,
    ) -> Result<Amount> {
        self.handle
            .request_unstake(participant.clone(), amount)
            .await
    }

    /// Cancel the participant's pending withdrawal request (queue scan form).
    pub async fn cancel_unstake(&self, participant: &ParticipantId) -> Result<()> {
        self.handle.cancel_unstake(participant.clone(), None).await
    }

    /// Cancel with a queue slot hint for O(1) removal; fails with
    /// `IndexMismatch` when the slot does not hold the participant.
    pub async fn cancel_unstake_at(
        &self,
        participant: &ParticipantId,
        index_hint: usize,
    ) -> Result<()> {
        self.handle
            .cancel_unstake(participant.clone(), Some(index_hint))
            .await
    }

    /// Settle every pending withdrawal in one atomic batch.
    ///
    /// The caller must hold the Owner or Dispenser capability.
    pub async fn settle(&self, actor: &ParticipantId) -> Result<SettlementOutcome> {
        self.authorize_batch(actor)?;
        self.handle.settle().await
    }

    /// Forcibly close the listed accounts, seizing their staked balances to
    /// `recovery`, in one atomic batch.
    ///
    /// The caller must hold the Owner or Dispenser capability.
    pub async fn close_accounts(
        &self,
        actor: &ParticipantId,
        recovery: &ParticipantId,
        participants: Vec<ParticipantId>,
        index_hints: Vec<usize>,
    ) -> Result<ClosureOutcome> {
        self.authorize_batch(actor)?;
        self.handle
            .close_accounts(recovery.clone(), participants, index_hints)
            .await
    }

    /// Staked minus pending; zero for unknown participants.
    pub async fn net_position(&self, participant: &ParticipantId) -> Result<Amount> {
        self.handle.net_position(participant.clone()).await
    }

    /// Balance record; zero-valued for unknown participants.
    pub async fn account(&self, participant: &ParticipantId) -> Result<AccountRecord> {
        self.handle.account(participant.clone()).await
    }

    /// Current active stakers (unordered).
    pub async fn stakers(&self) -> Result<Vec<ParticipantId>> {
        self.handle.stakers().await
    }

    /// Participants with a queued withdrawal request (unordered).
    pub async fn pending_withdrawals(&self) -> Result<Vec<ParticipantId>> {
        self.handle.pending_withdrawals().await
    }

    /// A participant's event history, oldest first.
    pub fn events_for(&self, participant: &ParticipantId) -> Result<Vec<StakingEvent>> {
        self.storage.events_for(participant)
    }

    /// Metrics collector (for scrape endpoints)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Ledger configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown ledger, releasing the database so it can be reopened
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            handle, storage, ..
        } = self;
        drop(storage);
        handle.shutdown().await
    }

    fn authorize_batch(&self, actor: &ParticipantId) -> Result<()> {
        if self.gate.has_role(Role::Owner, actor) || self.gate.has_role(Role::Dispenser, actor) {
            Ok(())
        } else {
            Err(Error::Unauthorized(actor.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{access::RoleRegistry, token::InMemoryToken, types::EventKind};

    fn p(name: &str) -> ParticipantId {
        ParticipantId::new(name)
    }

    struct TestLedger {
        ledger: StakingLedger,
        token: Arc<InMemoryToken>,
        roles: Arc<RoleRegistry>,
        _temp: tempfile::TempDir,
    }

    async fn create_test_ledger() -> TestLedger {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();

        let token = Arc::new(InMemoryToken::new());
        let roles = Arc::new(RoleRegistry::new(p("owner")));

        let ledger = StakingLedger::open(config, token.clone(), roles.clone())
            .await
            .unwrap();

        TestLedger {
            ledger,
            token,
            roles,
            _temp: temp,
        }
    }

    #[tokio::test]
    async fn test_ledger_open_and_shutdown() {
        let t = create_test_ledger().await;
        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stake_and_events() {
        let t = create_test_ledger().await;
        t.token.mint(&p("alice"), 300);

        assert_eq!(t.ledger.stake(&p("alice"), 100).await.unwrap(), 100);
        assert_eq!(t.ledger.stake(&p("alice"), 50).await.unwrap(), 150);

        let events = t.ledger.events_for(&p("alice")).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[1].kind,
            EventKind::StakeRecorded {
                amount: 50,
                total_staked: 150,
            }
        ));

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_settle_requires_capability() {
        let t = create_test_ledger().await;

        let result = t.ledger.settle(&p("mallory")).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        // Owner may settle, and so may a granted dispenser
        t.ledger.settle(&p("owner")).await.unwrap();
        t.roles.grant_dispenser(&p("owner"), &p("ops")).unwrap();
        t.ledger.settle(&p("ops")).await.unwrap();

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_accounts_requires_capability() {
        let t = create_test_ledger().await;

        let result = t
            .ledger
            .close_accounts(&p("mallory"), &p("recovery"), vec![p("alice")], vec![0])
            .await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        t.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();

        let token = Arc::new(InMemoryToken::new());
        let roles = Arc::new(RoleRegistry::new(p("owner")));
        token.mint(&p("alice"), 500);

        let ledger = StakingLedger::open(config.clone(), token.clone(), roles.clone())
            .await
            .unwrap();
        ledger.stake(&p("alice"), 200).await.unwrap();
        ledger.request_unstake(&p("alice"), 80).await.unwrap();
        ledger.shutdown().await.unwrap();

        let ledger = StakingLedger::open(config, token, roles).await.unwrap();
        let record = ledger.account(&p("alice")).await.unwrap();
        assert_eq!(record.staked, 200);
        assert_eq!(record.pending, 80);
        assert_eq!(ledger.pending_withdrawals().await.unwrap(), vec![p("alice")]);

        ledger.shutdown().await.unwrap();
    }
}
