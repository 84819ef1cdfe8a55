use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use market_sync::market_data::market_worker::{run_revalidator, run_state_logger};
use market_sync::metrics::prometheus;
use market_sync::{CoinGeckoClient, Config, MarketStore, SnapshotStore};

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    if let Some(port) = config.metrics_port {
        prometheus::init_metrics_server(port)?;
        info!(port, "prometheus exporter listening");
    }

    info!(base_url = %config.api_base_url, page_size = config.sync.page_size, "market-sync starting");

    let source = Arc::new(CoinGeckoClient::new(&config.api_base_url, config.request_timeout)?);
    let snapshots = match &config.snapshot_dir {
        Some(dir) => SnapshotStore::on_disk(dir),
        None => SnapshotStore::in_memory(),
    };

    let store = MarketStore::new(config.sync.clone(), source, snapshots);
    let logger_handle = tokio::spawn(run_state_logger(store.subscribe()));
    store.initialize().await;
    let revalidator_handle = tokio::spawn(run_revalidator(store.clone(), config.sync.cache_ttl));

    tokio::select! {
        res = logger_handle => {
            if let Err(err) = res {
                warn!(error = %err, "state logger task panicked");
            }
        }
        res = revalidator_handle => {
            if let Err(err) = res {
                warn!(error = %err, "revalidator task panicked");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl-C, shutting down");
        }
    }

    store.shutdown().await;

    Ok(())
}
