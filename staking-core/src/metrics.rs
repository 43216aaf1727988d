//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `staking_stakes_total` - Total stake deposits recorded
//! - `staking_unstake_requests_total` - Total withdrawal requests
//! - `staking_unstake_cancellations_total` - Total cancelled requests
//! - `staking_settlement_batches_total` - Settlement batches committed
//! - `staking_closure_batches_total` - Closure batches committed
//! - `staking_settlement_batch_size` - Histogram of payouts per batch
//! - `staking_queue_depth` - Current pending-withdrawal queue depth
//! - `staking_active_stakers` - Current active-staker count

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Total stake deposits recorded
    pub stakes_total: IntCounter,

    /// Total withdrawal requests
    pub unstake_requests_total: IntCounter,

    /// Total cancelled withdrawal requests
    pub unstake_cancellations_total: IntCounter,

    /// Settlement batches committed
    pub settlement_batches_total: IntCounter,

    /// Closure batches committed
    pub closure_batches_total: IntCounter,

    /// Payouts per settlement batch
    pub settlement_batch_size: Histogram,

    /// Current queue depth
    pub queue_depth: IntGauge,

    /// Current active-staker count
    pub active_stakers: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let stakes_total = IntCounter::with_opts(Opts::new(
            "staking_stakes_total",
            "Total stake deposits recorded",
        ))?;
        registry.register(Box::new(stakes_total.clone()))?;

        let unstake_requests_total = IntCounter::with_opts(Opts::new(
            "staking_unstake_requests_total",
            "Total withdrawal requests",
        ))?;
        registry.register(Box::new(unstake_requests_total.clone()))?;

        let unstake_cancellations_total = IntCounter::with_opts(Opts::new(
            "staking_unstake_cancellations_total",
            "Total cancelled withdrawal requests",
        ))?;
        registry.register(Box::new(unstake_cancellations_total.clone()))?;

        let settlement_batches_total = IntCounter::with_opts(Opts::new(
            "staking_settlement_batches_total",
            "Settlement batches committed",
        ))?;
        registry.register(Box::new(settlement_batches_total.clone()))?;

        let closure_batches_total = IntCounter::with_opts(Opts::new(
            "staking_closure_batches_total",
            "Closure batches committed",
        ))?;
        registry.register(Box::new(closure_batches_total.clone()))?;

        let settlement_batch_size = Histogram::with_opts(
            HistogramOpts::new(
                "staking_settlement_batch_size",
                "Payouts per settlement batch",
            )
            .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]),
        )?;
        registry.register(Box::new(settlement_batch_size.clone()))?;

        let queue_depth = IntGauge::with_opts(Opts::new(
            "staking_queue_depth",
            "Current pending-withdrawal queue depth",
        ))?;
        registry.register(Box::new(queue_depth.clone()))?;

        let active_stakers = IntGauge::with_opts(Opts::new(
            "staking_active_stakers",
            "Current active-staker count",
        ))?;
        registry.register(Box::new(active_stakers.clone()))?;

        Ok(Self {
            stakes_total,
            unstake_requests_total,
            unstake_cancellations_total,
            settlement_batches_total,
            closure_batches_total,
            settlement_batch_size,
            queue_depth,
            active_stakers,
            registry,
        })
    }
}
