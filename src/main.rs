//! courier: a Telegram channel media mirroring bot.
//!
//! This is the application entry point. It loads configuration from TOML
//! files, initializes tracing, spawns the Telegram worker pool, restores the
//! monitoring registry, starts the update dispatcher, and serves the HTTP
//! health endpoint until a termination signal arrives.

mod bot;
mod config;
mod error;
mod links;
mod monitor;
mod routes;
mod session;
mod state;
mod store;
mod telegram;
mod transfer;

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{
    AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER, LOG_FORMAT_JSON, SHUTDOWN_GRACE_SECS,
};
use state::AppState;
use store::MonitorStore;
use telegram::TelegramService;

/// courier: a Telegram channel media mirroring bot
#[derive(Parser, Debug)]
#[command(name = "courier", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "courier=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first so the configured log format applies
    let config = AppConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.format == LOG_FORMAT_JSON {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        owner_id = config.telegram.owner_id,
        target_channel = config.telegram.target_channel,
        "Loaded configuration"
    );

    // Temp directory for download-reupload transfers
    tokio::fs::create_dir_all(&config.storage.temp_dir).await?;

    // Initialize the Telegram service and its worker pool
    let telegram = TelegramService::new(&config)?;
    telegram.spawn_workers();

    // Verify the token and identify the bot account
    let me = telegram.client().get_me().await?;
    tracing::info!(name = %me.first_name, username = ?me.username, "Authenticated with Telegram");

    // Load the persistent monitoring registry
    let store = MonitorStore::load(&config.storage.db_path).await;

    // Create application state and restore monitoring
    let state = AppState::new(config.clone(), telegram, store);
    let restored = monitor::restore(&state.monitors, &state.store).await;
    tracing::info!(channels = restored, "Monitoring restored");

    // Start the update dispatcher
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = tokio::spawn(bot::run(state.clone(), shutdown_rx));

    // Serve the health endpoint
    let app = routes::create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port)
        .parse()
        .expect("Invalid http.host or http.port in config");
    tracing::info!("Health endpoint listening at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    // The HTTP server has drained; give the dispatcher its grace period
    if tokio::time::timeout(Duration::from_secs(SHUTDOWN_GRACE_SECS), dispatcher)
        .await
        .is_err()
    {
        tracing::warn!("Dispatcher did not stop within the grace period");
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Resolve when a termination signal arrives, after flagging shutdown to
/// background tasks.
///
/// When a signal is received, the server will:
/// 1. Stop accepting new connections and drain in-flight requests
/// 2. Signal the dispatcher and monitors to stop
/// 3. Exit once background tasks finish or the grace period elapses
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }

    let _ = shutdown_tx.send(true);
}
