use anyhow::{anyhow, Context, Result};
use power_api::AppState;
use power_collector::{Fetcher, SourceSet};
use power_control::{open_pool, AlertNotifier, Monitor, Registry, Scheduler};
use power_metrics::tracing::init_tracing;
use power_metrics::MetricsService;
use power_models::Config;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Unable to listen for shutdown signal: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                warn!("Unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Received shutdown signal");
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.logging).map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    info!("Starting Power Monitor");

    fs::create_dir_all(&config.data.dir)
        .with_context(|| format!("creating data directory {}", config.data.dir))?;
    let db_path = Path::new(&config.data.database_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }
    }

    let registry = Registry::new(open_pool(db_path).await?);
    registry.init().await?;
    info!("Database ready at {}", db_path.display());

    let metrics = Arc::new(MetricsService::new()?);
    let fetcher = Fetcher::new(&config.monitor)?;
    let sources = SourceSet::from_config(&config);
    let notifier = AlertNotifier::from_config(&config.alerts)?;
    let monitor = Arc::new(Monitor::new(
        registry.clone(),
        sources,
        fetcher,
        notifier,
        metrics.clone(),
        &config.monitor,
    ));
    info!("Monitoring sources: {}", monitor.source_names().join(", "));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scheduler_handle = Scheduler::new(monitor.clone(), config.scheduler.clone()).spawn(shutdown_rx);

    let state = AppState::new(config, registry, monitor, metrics);
    power_api::start_server(state, shutdown_signal())
        .await
        .map_err(|e| anyhow!("server error: {e}"))?;

    info!("Shutting down Power Monitor...");
    let _ = shutdown_tx.send(true);
    // A cycle in flight is abandoned after the grace period.
    if tokio::time::timeout(Duration::from_secs(5), &mut scheduler_handle)
        .await
        .is_err()
    {
        warn!("Scheduler still busy, aborting");
        scheduler_handle.abort();
    }

    info!("Power Monitor shutdown complete");
    Ok(())
}
