//! Main settlement engine
//!
//! Runs the ledger's privileged batch operations under a configured operator
//! identity and writes a reconciliation report per committed batch.

use crate::{
    config::Config,
    report::ReportWriter,
    types::{ClosureReport, SettlementReport},
    Result,
};
use staking_core::{AccessGate, ParticipantId, StakingLedger, TokenGateway};
use std::sync::Arc;

/// Settlement engine
pub struct SettlementEngine {
    /// The staking ledger
    ledger: Arc<StakingLedger>,

    /// Identity the batches run under
    operator: ParticipantId,

    /// Batch report writer
    reports: ReportWriter,

    /// Configuration
    config: Config,
}

impl SettlementEngine {
    /// Create new settlement engine, opening the ledger from configuration
    pub async fn new(
        config: Config,
        token: Arc<dyn TokenGateway>,
        gate: Arc<dyn AccessGate>,
    ) -> Result<Self> {
        let ledger_config = staking_core::Config {
            data_dir: config.ledger_data_dir.clone(),
            ..Default::default()
        };
        let ledger = Arc::new(StakingLedger::open(ledger_config, token, gate).await?);

        Ok(Self::with_ledger(config, ledger))
    }

    /// Wrap an already-open ledger
    pub fn with_ledger(config: Config, ledger: Arc<StakingLedger>) -> Self {
        let operator = ParticipantId::new(&config.operator_identity);
        let reports = ReportWriter::new(
            config.reports.output_dir.clone(),
            config.reports.pretty_print,
        );

        Self {
            ledger,
            operator,
            reports,
            config,
        }
    }

    /// The wrapped ledger
    pub fn ledger(&self) -> &Arc<StakingLedger> {
        &self.ledger
    }

    /// Engine configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Settle every pending withdrawal in one atomic batch and write the
    /// reconciliation report.
    pub async fn run_settlement(&self) -> Result<SettlementReport> {
        let queued = self.ledger.pending_withdrawals().await?.len();
        tracing::info!(queued, "Starting settlement batch");

        let outcome = self.ledger.settle(&self.operator).await?;
        let report = SettlementReport::from_outcome(&self.operator, outcome);
        let file = self.reports.write_settlement(&report)?;

        tracing::info!(
            batch_id = %report.batch_id,
            payouts = report.payout_count,
            total_paid = %report.total_paid,
            file = %file,
            "Settlement batch complete"
        );

        Ok(report)
    }

    /// Forcibly close the listed accounts in one atomic batch, seizing their
    /// staked balances to `recovery`, and write the reconciliation report.
    pub async fn close_accounts(
        &self,
        recovery: &ParticipantId,
        participants: Vec<ParticipantId>,
        index_hints: Vec<usize>,
    ) -> Result<ClosureReport> {
        tracing::info!(
            recovery = %recovery,
            accounts = participants.len(),
            "Starting closure batch"
        );

        let outcome = self
            .ledger
            .close_accounts(&self.operator, recovery, participants, index_hints)
            .await?;
        let report = ClosureReport::from_outcome(&self.operator, outcome);
        let file = self.reports.write_closure(&report)?;

        tracing::info!(
            batch_id = %report.batch_id,
            seizures = report.seizure_count,
            total_seized = %report.total_seized,
            file = %file,
            "Closure batch complete"
        );

        Ok(report)
    }

    /// Shutdown engine, closing the ledger when this engine holds the last
    /// reference to it
    pub async fn shutdown(self) -> Result<()> {
        tracing::info!("Shutting down settlement engine");
        if let Ok(ledger) = Arc::try_unwrap(self.ledger) {
            ledger.shutdown().await?;
        }
        Ok(())
    }
}
