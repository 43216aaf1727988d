//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify the critical invariants:
//! - `pending <= staked` for every account, at all observable points
//! - A participant is queued at most once, exactly when `pending > 0`
//! - A participant is registered as a staker exactly when `staked > 0`
//! - Settlement conserves value: staked before == staked after + paid out

use proptest::prelude::*;
use staking_core::{
    state::LedgerState, Amount, Config, InMemoryToken, ParticipantId, RoleRegistry,
    StakingLedger,
};
use std::sync::Arc;

/// Small participant pool so operations collide on the same accounts
const POOL: [&str; 5] = ["p0", "p1", "p2", "p3", "p4"];

fn participant(index: usize) -> ParticipantId {
    ParticipantId::new(POOL[index % POOL.len()])
}

/// One ledger operation drawn at random
#[derive(Debug, Clone)]
enum OpSpec {
    Stake { who: usize, amount: Amount },
    RequestUnstake { who: usize, amount: Amount },
    CancelUnstake { who: usize },
    CancelHinted { who: usize, hint: usize },
    Settle,
    Close { who: usize },
}

fn op_strategy() -> impl Strategy<Value = OpSpec> {
    prop_oneof![
        (0..POOL.len(), 1u128..1_000).prop_map(|(who, amount)| OpSpec::Stake { who, amount }),
        (0..POOL.len(), 1u128..1_000)
            .prop_map(|(who, amount)| OpSpec::RequestUnstake { who, amount }),
        (0..POOL.len()).prop_map(|who| OpSpec::CancelUnstake { who }),
        (0..POOL.len(), 0usize..6).prop_map(|(who, hint)| OpSpec::CancelHinted { who, hint }),
        Just(OpSpec::Settle),
        (0..POOL.len()).prop_map(|who| OpSpec::Close { who }),
    ]
}

/// Plan the operation against the state; apply it when valid. Invalid
/// operations (insufficient stake, bad hints, nothing pending) must leave
/// the state untouched, which the invariant check after every step verifies.
fn run_op(state: &mut LedgerState, op: &OpSpec) {
    let recovery = ParticipantId::new("recovery");
    let plan = match op {
        OpSpec::Stake { who, amount } => state.plan_stake(&participant(*who), *amount),
        OpSpec::RequestUnstake { who, amount } => {
            state.plan_request_unstake(&participant(*who), *amount)
        }
        OpSpec::CancelUnstake { who } => state.plan_cancel_unstake(&participant(*who), None),
        OpSpec::CancelHinted { who, hint } => {
            state.plan_cancel_unstake(&participant(*who), Some(*hint))
        }
        OpSpec::Settle => state.plan_settlement(),
        OpSpec::Close { who } => {
            let target = participant(*who);
            let hint = state.queue().slot_of(&target).unwrap_or(0);
            state.plan_closure(&recovery, &[target], &[hint])
        }
    };

    if let Ok(plan) = plan {
        state.apply(&plan.ops);
    }
}

fn total_staked(state: &LedgerState) -> Amount {
    POOL.iter()
        .map(|name| state.account(&ParticipantId::new(*name)).staked)
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: the coupling invariants hold after every operation in an
    /// arbitrary interleaving of stake/unstake/cancel/settle/close calls
    #[test]
    fn prop_invariants_hold_under_arbitrary_interleavings(
        ops in prop::collection::vec(op_strategy(), 1..80)
    ) {
        let mut state = LedgerState::new();

        for op in &ops {
            run_op(&mut state, op);
            prop_assert!(state.check_invariants().is_ok(), "invariants broken after {:?}", op);
        }
    }

    /// Property: settlement pays out exactly the pending total and reduces
    /// staked balances by the same amount
    #[test]
    fn prop_settlement_conserves_value(
        ops in prop::collection::vec(op_strategy(), 1..40)
    ) {
        let mut state = LedgerState::new();
        for op in &ops {
            run_op(&mut state, op);
        }

        let staked_before = total_staked(&state);
        let pending_total: Amount = state
            .queue()
            .snapshot()
            .iter()
            .map(|p| state.account(p).pending)
            .sum();

        let plan = state.plan_settlement().unwrap();
        state.apply(&plan.ops);

        prop_assert!(state.check_invariants().is_ok());
        prop_assert_eq!(total_staked(&state), staked_before - pending_total);
        prop_assert!(state.queue().is_empty());
    }

    /// Property: a second cancel in a row always fails and changes nothing
    #[test]
    fn prop_cancel_is_not_idempotent_but_safe(
        stake_amount in 1u128..1_000,
        unstake_amount in 1u128..1_000,
    ) {
        prop_assume!(unstake_amount <= stake_amount);

        let mut state = LedgerState::new();
        let alice = ParticipantId::new("alice");

        let plan = state.plan_stake(&alice, stake_amount).unwrap();
        state.apply(&plan.ops);
        let plan = state.plan_request_unstake(&alice, unstake_amount).unwrap();
        state.apply(&plan.ops);

        let plan = state.plan_cancel_unstake(&alice, None).unwrap();
        state.apply(&plan.ops);
        prop_assert_eq!(state.account(&alice).pending, 0);

        // Second cancel fails, first one's effect stands
        prop_assert!(state.plan_cancel_unstake(&alice, None).is_err());
        prop_assert_eq!(state.account(&alice).staked, stake_amount);
        prop_assert!(state.check_invariants().is_ok());
    }
}

mod integration_tests {
    use super::*;
    use staking_core::Error;

    struct Harness {
        ledger: StakingLedger,
        token: Arc<InMemoryToken>,
        roles: Arc<RoleRegistry>,
        _temp: tempfile::TempDir,
    }

    fn p(name: &str) -> ParticipantId {
        ParticipantId::new(name)
    }

    fn owner() -> ParticipantId {
        p("owner")
    }

    async fn harness() -> Harness {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp.path().to_path_buf();

        let token = Arc::new(InMemoryToken::new());
        let roles = Arc::new(RoleRegistry::new(owner()));
        let ledger = StakingLedger::open(config, token.clone(), roles.clone())
            .await
            .unwrap();

        Harness {
            ledger,
            token,
            roles,
            _temp: temp,
        }
    }

    /// Fund and stake in one step
    async fn stake(h: &Harness, name: &str, amount: Amount) {
        h.token.mint(&p(name), amount);
        h.ledger.stake(&p(name), amount).await.unwrap();
    }

    #[tokio::test]
    async fn test_round_trip_settlement() {
        let h = harness().await;
        stake(&h, "alice", 100).await;
        h.ledger.request_unstake(&p("alice"), 40).await.unwrap();

        let outcome = h.ledger.settle(&owner()).await.unwrap();
        assert_eq!(outcome.total_paid, 40);

        let record = h.ledger.account(&p("alice")).await.unwrap();
        assert_eq!(record.staked, 60);
        assert_eq!(record.pending, 0);
        assert_eq!(h.token.balance_of(&p("alice")), 40);
        assert_eq!(h.ledger.stakers().await.unwrap(), vec![p("alice")]);

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_exit_boundary() {
        let h = harness().await;
        stake(&h, "alice", 50).await;
        h.ledger.request_unstake(&p("alice"), 50).await.unwrap();

        h.ledger.settle(&owner()).await.unwrap();

        let record = h.ledger.account(&p("alice")).await.unwrap();
        assert!(record.is_zero());
        assert!(h.ledger.stakers().await.unwrap().is_empty());
        assert!(h.ledger.pending_withdrawals().await.unwrap().is_empty());
        assert_eq!(h.token.balance_of(&p("alice")), 50);

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_accumulating_requests_hit_the_stake_ceiling() {
        let h = harness().await;
        stake(&h, "alice", 100).await;

        assert_eq!(h.ledger.request_unstake(&p("alice"), 30).await.unwrap(), 30);
        assert_eq!(h.ledger.request_unstake(&p("alice"), 30).await.unwrap(), 60);

        // 60 + 50 > 100
        let result = h.ledger.request_unstake(&p("alice"), 50).await;
        assert!(matches!(result, Err(Error::InsufficientStake { .. })));
        assert_eq!(h.ledger.account(&p("alice")).await.unwrap().pending, 60);

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_closure_leaves_other_participants_untouched() {
        let h = harness().await;
        stake(&h, "alice", 100).await;
        stake(&h, "bob", 80).await;
        h.ledger.request_unstake(&p("alice"), 25).await.unwrap();

        let hint = 0; // alice is the only queued participant
        let outcome = h
            .ledger
            .close_accounts(&owner(), &p("recovery"), vec![p("alice")], vec![hint])
            .await
            .unwrap();
        assert_eq!(outcome.total_seized, 100);
        assert_eq!(h.token.balance_of(&p("recovery")), 100);

        assert!(h.ledger.account(&p("alice")).await.unwrap().is_zero());
        assert_eq!(h.ledger.net_position(&p("alice")).await.unwrap(), 0);

        // Bob's balances untouched
        let bob = h.ledger.account(&p("bob")).await.unwrap();
        assert_eq!(bob.staked, 80);
        assert_eq!(h.ledger.stakers().await.unwrap(), vec![p("bob")]);

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_twice_fails_second_time() {
        let h = harness().await;
        stake(&h, "alice", 100).await;
        h.ledger.request_unstake(&p("alice"), 10).await.unwrap();

        h.ledger.cancel_unstake(&p("alice")).await.unwrap();

        let result = h.ledger.cancel_unstake(&p("alice")).await;
        assert!(matches!(result, Err(Error::NoPendingRequest(_))));

        // First cancel's effect stands
        let record = h.ledger.account(&p("alice")).await.unwrap();
        assert_eq!(record.staked, 100);
        assert_eq!(record.pending, 0);

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_hinted_cancel_validates_the_slot() {
        let h = harness().await;
        stake(&h, "alice", 100).await;
        stake(&h, "bob", 100).await;
        h.ledger.request_unstake(&p("alice"), 10).await.unwrap();
        h.ledger.request_unstake(&p("bob"), 10).await.unwrap();

        // Bob sits at slot 1; slot 0 belongs to alice
        let result = h.ledger.cancel_unstake_at(&p("bob"), 0).await;
        assert!(matches!(result, Err(Error::IndexMismatch { index: 0, .. })));

        h.ledger.cancel_unstake_at(&p("bob"), 1).await.unwrap();
        assert_eq!(
            h.ledger.pending_withdrawals().await.unwrap(),
            vec![p("alice")]
        );

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_settlement_failure_rolls_back_the_whole_batch() {
        let h = harness().await;
        for name in ["a", "b", "c"] {
            stake(&h, name, 100).await;
            h.ledger.request_unstake(&p(name), 40).await.unwrap();
        }

        // Second payout in queue order will be refused
        h.token.deny(&p("b"));

        let result = h.ledger.settle(&owner()).await;
        assert!(matches!(result, Err(Error::TransferRejected(_))));

        // No partial settlement survives: all three accounts exactly as
        // before the call, queue intact, custody made whole again
        for name in ["a", "b", "c"] {
            let record = h.ledger.account(&p(name)).await.unwrap();
            assert_eq!(record.staked, 100);
            assert_eq!(record.pending, 40);
            assert_eq!(h.token.balance_of(&p(name)), 0);
        }
        assert_eq!(h.ledger.pending_withdrawals().await.unwrap().len(), 3);
        assert_eq!(h.token.custody_balance(), 300);

        // Lifting the denial lets the same batch through
        h.token.allow(&p("b"));
        let outcome = h.ledger.settle(&owner()).await.unwrap();
        assert_eq!(outcome.total_paid, 120);

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_batch_operations_require_capability() {
        let h = harness().await;

        let result = h.ledger.settle(&p("mallory")).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        let result = h
            .ledger
            .close_accounts(&p("mallory"), &p("recovery"), vec![], vec![])
            .await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));

        // A granted dispenser may run both
        h.roles.grant_dispenser(&owner(), &p("ops")).unwrap();
        h.ledger.settle(&p("ops")).await.unwrap();
        h.ledger
            .close_accounts(&p("ops"), &p("recovery"), vec![], vec![])
            .await
            .unwrap();

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_closure_batch_arrays_must_pair_up() {
        let h = harness().await;

        let result = h
            .ledger
            .close_accounts(&owner(), &p("recovery"), vec![p("a"), p("b")], vec![0])
            .await;
        assert!(matches!(
            result,
            Err(Error::LengthMismatch {
                participants: 2,
                hints: 1,
            })
        ));

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_history_records_the_lifecycle() {
        use staking_core::EventKind;

        let h = harness().await;
        stake(&h, "alice", 100).await;
        h.ledger.request_unstake(&p("alice"), 40).await.unwrap();
        h.ledger.settle(&owner()).await.unwrap();

        let events = h.ledger.events_for(&p("alice")).unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::StakeRecorded {
                    amount: 100,
                    total_staked: 100,
                },
                EventKind::UnstakeRequested {
                    amount: 40,
                    total_pending: 40,
                },
                EventKind::WithdrawalSettled { amount: 40 },
            ]
        );

        h.ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_amounts_are_rejected() {
        let h = harness().await;
        stake(&h, "alice", 10).await;

        assert!(matches!(
            h.ledger.stake(&p("alice"), 0).await,
            Err(Error::InvalidAmount)
        ));
        assert!(matches!(
            h.ledger.request_unstake(&p("alice"), 0).await,
            Err(Error::InvalidAmount)
        ));

        h.ledger.shutdown().await.unwrap();
    }
}
