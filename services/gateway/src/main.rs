mod config;
mod error;
mod follower;
mod handlers;
mod models;
mod provider;
mod router;
mod state;

use anyhow::{Context, bail};
use assembler::{SubstandardRegistry, SubstandardScripts, TransactionAssembler};
use config::GatewayConfig;
use contracts::bootstrap::ProtocolBootstrapParams;
use indexer::IndexerConfig;
use indexer::journal::JournalConfig;
use indexer::recovery::JournaledIndexer;
use indexer::snapshot::SnapshotConfig;
use provider::{HttpLedgerProvider, RetryPolicy};
use router::create_router;
use state::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn load_params(config: &GatewayConfig) -> anyhow::Result<ProtocolBootstrapParams> {
    let raw = std::fs::read_to_string(&config.bootstrap_path)
        .with_context(|| format!("reading {}", config.bootstrap_path.display()))?;
    let params = ProtocolBootstrapParams::from_json(&raw).context("parsing bootstrap parameters")?;
    if params.network != config.network {
        bail!(
            "bootstrap parameters are for {:?} but the gateway is configured for {:?}",
            params.network,
            config.network
        );
    }
    Ok(params)
}

fn load_substandards(config: &GatewayConfig) -> anyhow::Result<SubstandardRegistry> {
    let Some(path) = &config.substandards_path else {
        warn!("GATEWAY_SUBSTANDARDS_PATH unset; no substandards available");
        return Ok(SubstandardRegistry::new());
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let deployments = SubstandardScripts::table_from_json(&raw).context("parsing substandard deployments")?;
    Ok(SubstandardRegistry::from_deployments(
        &deployments,
        &config.disabled_substandards,
    )?)
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting programmable token gateway");

    let config = GatewayConfig::from_env()?;
    let params = load_params(&config)?;
    let substandards = load_substandards(&config)?;

    let mut indexer_config = IndexerConfig::new(params.clone());
    indexer_config.substandards = substandards.transfer_logic_ids();
    indexer_config.credential_lists = config.credential_lists.clone();
    indexer_config.watched = config.watched.clone();

    let (indexer, report) = JournaledIndexer::open(
        indexer_config,
        JournalConfig::new(&config.journal_dir),
        config.snapshot_dir.as_ref().map(SnapshotConfig::new),
    )?;
    info!(
        replayed = report.replayed,
        snapshot_sequence = report.snapshot_sequence,
        state_hash = %report.state_hash,
        elapsed_ms = report.elapsed_ms,
        "Indexer recovered"
    );

    let provider = Arc::new(HttpLedgerProvider::new(
        config.provider_url.clone(),
        RetryPolicy {
            timeout: config.provider_timeout,
            retries: config.provider_retries,
            base_delay: config.retry_delay,
        },
    ));
    let assembler = TransactionAssembler::new(params, substandards, config.selection.clone());
    let state = AppState::new(indexer, assembler, provider);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let follower = tokio::spawn(follower::run(state.clone(), config.poll_interval, shutdown_rx));

    let app = create_router(state);
    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, network = ?config.network, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    follower.await?;
    Ok(())
}
