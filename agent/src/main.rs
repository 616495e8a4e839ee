//! Fieldsync Agent - long-running sync daemon.
//!
//! Opens the local store, keeps connectivity state fresh by probing the remote
//! store, and drains pending records on reconnect and on a fixed interval
//! until interrupted.

use fieldsync_agent::{
    spawn_periodic_sync, spawn_reachability_probe, spawn_sync_on_reconnect, start_tracking,
    AppState, Config, ConnectivityMonitor, InMemoryScheduler,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsync_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting Fieldsync Agent against {}", config.remote_url);

    let state = AppState::open(&config).await?;
    let summary = state.orchestrator.pending_summary().await?;
    tracing::info!(?summary, "Local store ready");

    let scheduler = InMemoryScheduler::new();
    start_tracking(&scheduler, &config.tracking_options())?;

    let monitor = ConnectivityMonitor::default();
    let tasks = vec![
        spawn_sync_on_reconnect(&monitor, state.orchestrator.clone()),
        spawn_reachability_probe(&monitor, state.http.clone(), config.probe_interval()),
        spawn_periodic_sync(state.orchestrator.clone(), config.sync_interval()),
    ];

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    for task in &tasks {
        task.abort();
    }
    futures::future::join_all(tasks).await;
    state.store.close().await;

    Ok(())
}
