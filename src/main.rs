//! click-ledger - A session-authenticated click counter ledger
//!
//! This is the main entry point for the click-ledger application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use click_ledger::auth::AuthManager;
use click_ledger::config::Config;
use click_ledger::database::SqliteDatabase;
use click_ledger::ledger::Ledger;
use click_ledger::logging::init_tracing;
use click_ledger::server::{AppState, Server};

/// click-ledger - A session-authenticated click counter ledger
#[derive(Parser, Debug)]
#[command(name = "click-ledger")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "CLICK_LEDGER_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args)?;

    // Initialize tracing/logging
    init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting click-ledger");

    // Initialize database
    let database = SqliteDatabase::new(&config.database.path).await?;
    let database = Arc::new(database);
    info!(path = %config.database.path, "Database initialized");

    // Initialize authentication manager
    let auth_config = config.auth.manager_config();
    info!(
        session_ttl_secs = ?config.auth.session_ttl_secs,
        max_failures = auth_config.rate_limit.max_failures,
        "Authentication manager initialized"
    );
    let auth_manager = Arc::new(AuthManager::new(Arc::clone(&database), auth_config));

    // Initialize counter ledger
    let ledger = Arc::new(Ledger::new(
        database,
        config.ledger.default_value_per_click,
    ));

    let state = AppState {
        auth_manager,
        ledger,
    };

    // Create and start the HTTP server
    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        origins = ?config.server.cors_allowed_origins,
        "Starting HTTP server"
    );

    server.run(shutdown_signal()).await?;

    info!("click-ledger shutdown complete");
    Ok(())
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
        None => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
        }
    }
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
