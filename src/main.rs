//! Devwatch daemon
//!
//! Run with: cargo run --bin devwatch -- [--config path/to/config.toml]
//!
//! Starts the feed client, price oracle, timers, engine and HTTP API, and
//! shuts them down in order on Ctrl-C or SIGTERM, flushing state to disk.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use devwatch::api::{serve, AppState};
use devwatch::config::{Config, LoggingConfig};
use devwatch::engine::{Engine, Scheduler};
use devwatch::feed::{FeedClient, FeedClientConfig};
use devwatch::oracle::{CoinGeckoSource, PriceOracle};
use devwatch::store::{FileStore, TrackerStore};
use devwatch::tracker::Tracker;
use devwatch::websocket::{ConnectionHub, HubConfig};

/// How long background tasks get to stop before they are abandoned
const STOP_GRACE: Duration = Duration::from_secs(5);

const VIEW_CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser)]
#[command(name = "devwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track token launches from followed wallets on the PumpPortal feed")]
struct Args {
    /// Config file (default: search the standard locations)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_tracing(&config.logging);
    tracing::info!("Starting Devwatch v{}", env!("CARGO_PKG_VERSION"));

    // Restore persisted state
    let data_dir = config.store.data_path();
    let backend = FileStore::open(&data_dir)
        .with_context(|| format!("Cannot open data directory {:?}", data_dir))?;
    let mut store = TrackerStore::new(backend);
    let state = store.load_state();
    for backup in store.set_aside_keys() {
        tracing::warn!(backup = %backup, "Unreadable saved state was copied aside");
    }
    tracing::info!(
        data_dir = ?data_dir,
        devs = state.devs.len(),
        tokens = state.tokens.len(),
        "Loaded saved state"
    );

    let tracker = Tracker::new(
        state,
        config.oracle.initial_price_usd,
        chrono::Utc::now().timestamp_millis(),
    );

    // Engine and its outbound channels
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();
    let (views_tx, views_rx) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
    let (engine, handle) = Engine::new(tracker, store, feed_tx, views_tx);

    let hub = Arc::new(ConnectionHub::new(HubConfig {
        max_connections: config.api.max_ws_connections,
    }));
    tokio::spawn(Arc::clone(&hub).forward(views_rx));

    let engine_task = tokio::spawn(engine.run());

    // Producers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let feed_client = FeedClient::new(FeedClientConfig::from(&config.feed));
    let feed_task = tokio::spawn(feed_client.run(feed_rx, handle.sender(), shutdown_rx.clone()));

    let source = CoinGeckoSource::new(&config.oracle).context("Cannot build price client")?;
    let oracle = PriceOracle::new(source, config.oracle.refresh_interval());
    let oracle_task = tokio::spawn(oracle.run(handle.sender(), shutdown_rx));

    let mut scheduler = Scheduler::start(&config.scheduler, handle.sender());

    // Serve until a shutdown signal arrives
    let app_state = AppState::with_hub(handle.clone(), hub, config.api.clone());
    let served = serve(app_state, shutdown_signal()).await;
    if let Err(e) = &served {
        tracing::error!(error = %e, "API server failed");
    }

    tracing::info!("Shutting down...");
    scheduler.stop();
    let _ = shutdown_tx.send(true);

    for (name, task) in [("feed client", feed_task), ("price oracle", oracle_task)] {
        if tokio::time::timeout(STOP_GRACE, task).await.is_err() {
            tracing::warn!(task = name, "Task did not stop in time");
        }
    }

    if let Err(e) = handle.shutdown().await {
        tracing::warn!(error = %e, "Engine already stopped");
    }
    match tokio::time::timeout(STOP_GRACE, engine_task).await {
        Ok(Ok(_)) => tracing::info!("State flushed"),
        Ok(Err(e)) => tracing::error!(error = %e, "Engine task failed"),
        Err(_) => tracing::warn!("Engine did not stop in time"),
    }

    tracing::info!("Devwatch stopped");
    served.map_err(Into::into)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("devwatch={},tower_http=info", logging.level))
    });
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
