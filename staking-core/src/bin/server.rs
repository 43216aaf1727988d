//! Staking ledger server binary

use staking_core::{Config, InMemoryToken, ParticipantId, RoleRegistry, StakingLedger};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting StakeRail staking server");

    // Load configuration
    let config = Config::from_env()?;
    let owner = ParticipantId::new(&config.owner_identity);
    tracing::info!(owner = %owner, data_dir = ?config.data_dir, "Configuration loaded");

    // Wire collaborators and open the ledger
    let token = Arc::new(InMemoryToken::new());
    let gate = Arc::new(RoleRegistry::new(owner));
    let ledger = StakingLedger::open(config, token, gate).await?;
    tracing::info!("Ledger opened successfully");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down staking server");
    ledger.shutdown().await?;
    Ok(())
}
