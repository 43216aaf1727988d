//! Batch report generation
//!
//! Writes one JSON file per committed batch for downstream reconciliation.
//!
//! # Example Output
//!
//! ```json
//! {
//!   "batch_id": "7f9c0e6a-...",
//!   "executed_at": "2026-08-06T12:00:00Z",
//!   "operator": "operator",
//!   "payout_count": 2,
//!   "total_paid": 100,
//!   "payouts": [
//!     { "participant": "alice", "amount": 40 },
//!     { "participant": "bob", "amount": 60 }
//!   ]
//! }
//! ```

use crate::{
    types::{ClosureReport, SettlementReport},
    Result,
};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

/// JSON batch report writer
#[derive(Debug, Clone)]
pub struct ReportWriter {
    /// Output directory
    output_dir: PathBuf,

    /// Pretty print
    pretty: bool,
}

impl ReportWriter {
    /// Create new writer
    pub fn new(output_dir: PathBuf, pretty: bool) -> Self {
        Self { output_dir, pretty }
    }

    /// Write a settlement batch report; returns the file name
    pub fn write_settlement(&self, report: &SettlementReport) -> Result<String> {
        self.write(report, "settlement", report.batch_id, &report.executed_at)
    }

    /// Write a closure batch report; returns the file name
    pub fn write_closure(&self, report: &ClosureReport) -> Result<String> {
        self.write(report, "closure", report.batch_id, &report.executed_at)
    }

    fn write<T: Serialize>(
        &self,
        report: &T,
        kind: &str,
        batch_id: Uuid,
        executed_at: &chrono::DateTime<chrono::Utc>,
    ) -> Result<String> {
        // Create output directory
        std::fs::create_dir_all(&self.output_dir)?;

        // File name: STAKERAIL-YYYYMMDD-HHMMSS-<kind>-<batch>.json
        let filename = format!(
            "STAKERAIL-{}-{}-{}.json",
            executed_at.format("%Y%m%d-%H%M%S"),
            kind,
            &batch_id.simple().to_string()[..8],
        );

        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };

        std::fs::write(self.output_dir.join(&filename), json)?;

        tracing::info!("Generated batch report: {}", filename);
        Ok(filename)
    }
}
