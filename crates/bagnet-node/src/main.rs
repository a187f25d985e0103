mod config;
mod logging;

use anyhow::Result;
use bagnet_chain::ChainClient;
use bagnet_storage::{Credentials, StorageClient};
use bagnet_store::Store;
use bagnet_transport::TransportClient;
use bagnet_workers::{FilesWorker, HistoryCleaner};
use clap::Parser;
use config::NodeConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "bagnet", version, about = "bagnet storage broker daemon")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    config.apply_env_overrides();

    logging::init_logging(&config.logging, cli.verbose)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting bagnet broker");

    let store = Store::connect(&config.store_config()).await?;
    store.migrate().await?;

    let credentials = if config.storage.login.is_empty() {
        None
    } else {
        Some(Credentials {
            login: config.storage.login.clone(),
            password: config.storage.password.clone(),
        })
    };
    let storage = Arc::new(StorageClient::new(
        &config.storage.base_url,
        &config.storage.bags_dir,
        credentials,
    )?);
    let chain = Arc::new(ChainClient::new(&config.chain.endpoint)?);
    let transport = Arc::new(TransportClient::new(&config.transport.endpoint)?);

    let worker = Arc::new(FilesWorker::new(
        Arc::new(store.bags()),
        Arc::new(store.notifications()),
        storage,
        chain,
        transport,
        config.worker_config(),
    ));
    let cleaner = Arc::new(HistoryCleaner::new(
        Arc::new(store.notifications()),
        config.lifetimes.store_history_days,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = bagnet_workers::spawn_all(worker, cleaner, shutdown_rx);
    info!(loops = handles.len(), "Orchestration loops running");

    wait_for_shutdown_signal().await;
    info!("Received shutdown signal");

    if shutdown_tx.send(true).is_err() {
        error!("All loops already stopped");
    }
    for handle in handles {
        let _ = handle.await;
    }
    store.close().await;
    info!("Shutdown complete");

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
