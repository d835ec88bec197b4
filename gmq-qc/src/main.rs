//! GMQ queue controller (gmq-qc) - Main entry point
//!
//! Loads configuration, opens the playlist store, connects the Lavalink
//! client and serves the HTTP command surface until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gmq_common::config::TomlConfig;
use gmq_common::events::EventBus;
use gmq_qc::api::{self, AppContext};
use gmq_qc::backend::LavalinkClient;
use gmq_qc::commands::CommandService;
use gmq_qc::config::Config;
use gmq_qc::session::SessionRegistry;
use gmq_qc::store::{JsonFilePersistence, PlaylistStore};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for gmq-qc
#[derive(Parser, Debug)]
#[command(name = "gmq-qc")]
#[command(about = "Guild music queue controller")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "GMQ_PORT")]
    port: Option<u16>,

    /// Folder holding the playlist document
    #[arg(short, long, env = "GMQ_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "GMQ_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing starts so its log level can apply
    let toml = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let config = Config::resolve(args.port, args.data_folder.as_deref(), &toml);

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "gmq_qc={level},gmq_common={level},tower_http=debug",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting GMQ queue controller v{} ({}) on port {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        config.listen_port
    );
    info!("Data folder: {}", config.data_folder.display());
    info!("Audio backend: {}", config.backend.url);

    std::fs::create_dir_all(&config.data_folder).with_context(|| {
        format!(
            "Failed to create data folder {}",
            config.data_folder.display()
        )
    })?;

    let events = EventBus::new(config.event_capacity);

    let store = Arc::new(
        PlaylistStore::open(
            Arc::new(JsonFilePersistence::new(&config.playlist_path)),
            config.retry,
            events.clone(),
        )
        .await
        .context("Failed to open playlist store")?,
    );

    let lavalink = Arc::new(
        LavalinkClient::new(&config.backend).context("Failed to create Lavalink client")?,
    );

    let registry = Arc::new(SessionRegistry::new(
        lavalink.clone(),
        lavalink.clone(),
        events.clone(),
        config.session.clone(),
    ));

    if config.privileged_secret.is_none() {
        info!("No privileged secret configured, extreme volume disabled");
    }

    let commands = Arc::new(CommandService::new(
        Arc::clone(&registry),
        lavalink,
        store,
        config.privileged_secret.clone(),
    ));

    let ctx = AppContext {
        commands,
        events,
        port: config.listen_port,
    };

    api::server::run(ctx, shutdown_signal())
        .await
        .context("Server error")?;

    registry.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
