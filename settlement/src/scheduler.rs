//! Interval-based settlement trigger
//!
//! Purely a service-layer convenience: the ledger core has no background
//! tasks, so an operator either calls the engine on demand or runs this
//! scheduler, which settles whenever enough withdrawal requests are queued.

use crate::{config::SchedulerConfig, engine::SettlementEngine, types::SettlementReport, Result};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Settlement scheduler
pub struct SettlementScheduler {
    /// Engine driving the batches
    engine: Arc<SettlementEngine>,

    /// Interval between runs
    period: Duration,

    /// Minimum queued withdrawal requests before a run settles
    min_pending: usize,
}

impl SettlementScheduler {
    /// Create new scheduler
    pub fn new(engine: Arc<SettlementEngine>, config: &SchedulerConfig) -> Self {
        Self {
            engine,
            period: Duration::from_secs(config.interval_seconds),
            min_pending: config.min_pending,
        }
    }

    /// Run one scheduling decision: settle when the queue is deep enough,
    /// skip otherwise.
    pub async fn tick(&self) -> Result<Option<SettlementReport>> {
        let queued = self.engine.ledger().pending_withdrawals().await?.len();

        if queued == 0 || queued < self.min_pending {
            tracing::debug!(
                queued,
                min_pending = self.min_pending,
                "Skipping settlement run"
            );
            return Ok(None);
        }

        let report = self.engine.run_settlement().await?;
        Ok(Some(report))
    }

    /// Start the scheduler loop
    pub async fn start(self: Arc<Self>) -> Result<()> {
        tracing::info!(
            period_seconds = self.period.as_secs(),
            min_pending = self.min_pending,
            "Starting settlement scheduler"
        );

        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;

            if let Err(e) = self.tick().await {
                tracing::error!("Settlement run failed: {}", e);
            }
        }
    }
}
