//! revert-indexer - transaction revert classifier
//!
//! Traces pending transactions against an Ethereum node and records
//! whether they reverted, and why.

use anyhow::{Context, Result};
use clap::Parser;
use revert_indexer::config::{Args, Config};
use revert_indexer::indexer::Indexer;
use revert_indexer::rpc::RpcClient;
use revert_indexer::store::PgStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args).context("Failed to load configuration")?;

    // Initialize logging; RUST_LOG takes precedence over --debug
    let level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    info!("Starting revert indexer");
    info!("RPC URL: {}", config.rpc_url);
    info!("Block range: {:?}", config.indexer.block_range);

    let rpc = RpcClient::new(config.rpc_url.clone(), config.rpc_timeout)
        .context("Unable to create RPC client")?;

    let store = PgStore::connect(&config.database)
        .await
        .context("Unable to connect to database")?;

    let cancellation = CancellationToken::new();
    let signal_cancellation = cancellation.clone();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(()) => info!("Received shutdown signal, shutting down gracefully..."),
            Err(e) => error!(reason = ?e, "failed to listen for shutdown signals"),
        }
        signal_cancellation.cancel();
    });

    let indexer = Indexer::new(store.clone(), rpc, config.indexer);
    indexer.run(cancellation).await;

    store.close().await;
    info!("Indexer stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    let mut quit = signal(SignalKind::quit()).context("Failed to install SIGQUIT handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("Failed to listen for Ctrl+C")?,
        _ = terminate.recv() => {}
        _ = hangup.recv() => {}
        _ = quit.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")
}
