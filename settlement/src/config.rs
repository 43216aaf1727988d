//! Configuration for the settlement service

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settlement service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Ledger data directory
    pub ledger_data_dir: PathBuf,

    /// Identity the engine acts under; must hold Owner or Dispenser
    pub operator_identity: String,

    /// Report output configuration
    pub reports: ReportConfig,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Metrics listen address
    pub metrics_listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "settlement-engine".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            ledger_data_dir: PathBuf::from("./data/staking"),
            operator_identity: "operator".to_string(),
            reports: ReportConfig::default(),
            scheduler: SchedulerConfig::default(),
            metrics_listen_addr: "0.0.0.0:9091".to_string(),
        }
    }
}

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output directory for batch report files
    pub output_dir: PathBuf,

    /// Pretty print JSON
    pub pretty_print: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data/settlement/reports"),
            pretty_print: true,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run settlement on an interval
    pub enabled: bool,

    /// Interval between runs in seconds (default: 6 hours = 21600s)
    pub interval_seconds: u64,

    /// Minimum queued withdrawal requests before a run settles
    pub min_pending: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: 21600, // 6 hours
            min_pending: 1,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("SETTLEMENT_LEDGER_DIR") {
            config.ledger_data_dir = PathBuf::from(dir);
        }

        if let Ok(operator) = std::env::var("SETTLEMENT_OPERATOR") {
            config.operator_identity = operator;
        }

        if let Ok(dir) = std::env::var("SETTLEMENT_REPORT_DIR") {
            config.reports.output_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "settlement-engine");
        assert_eq!(config.operator_identity, "operator");
        assert!(!config.scheduler.enabled);
        assert_eq!(config.scheduler.min_pending, 1);
    }
}
