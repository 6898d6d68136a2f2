//! NexusTodo server binary.

use anyhow::{Context, Result};
use clap::Parser;
use nexustodo::auth::BearerAuth;
use nexustodo::cli::{Cli, Command};
use nexustodo::config::ConfigLoader;
use nexustodo::db::Database;
use nexustodo::logging::{LogTarget, init_logging};
use nexustodo::server::{AppState, start_server};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut loader = ConfigLoader::load(cli.config.as_deref())?;
    if let Some(path) = loader.config_path() {
        info!("Loaded config from {}", path.display());
    }
    cli.apply_overrides(loader.config_mut());
    let config = loader.into_config();

    config
        .ensure_db_dir()
        .context("creating database directory")?;
    let db = Database::open(&config.server.db_path)
        .with_context(|| format!("opening database {}", config.server.db_path.display()))?;
    info!("Database ready at {}", config.server.db_path.display());

    if cli.command == Some(Command::Migrate) {
        return Ok(());
    }

    if config.server.uses_default_token() {
        warn!("Using the built-in auth token; set DEFAULT_TOKEN for anything beyond local use");
    }

    let state = AppState::new(Arc::new(db), BearerAuth::new(&config.server.auth_token));
    let handle = start_server(state, config.server.listen_addr()).await?;

    shutdown_signal().await;
    handle.shutdown().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
}
