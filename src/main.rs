//! docrelay - document transfer server
//!
//! Accepts ACK-gated document uploads over TCP, runs the requested
//! transformation and streams the result back.

use clap::Parser;
use docrelay_engine::{CommandEngine, LopdfEngine, RoutingEngine};
use docrelay_server::{Config, Server, ServerConfig};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docrelay")]
#[command(about = "Document transfer server")]
#[command(version)]
struct Args {
    /// YAML configuration file (overrides DOCRELAY_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let explicit = args
        .config
        .clone()
        .or_else(|| std::env::var_os("DOCRELAY_CONFIG").map(PathBuf::from));

    // Load configuration (explicit file if given, then env overrides)
    let config = match Config::load_with(args.config.as_deref()) {
        Ok(c) => {
            if let Some(path) = &explicit {
                tracing::info!("Loaded config from {}", path.display());
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if explicit.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            // Otherwise fall back to defaults
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    tracing::info!("Starting docrelay server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Temp root: {}", config.workspace.temp_root.display());
    tracing::info!(
        "  Timeouts: handshake={}s chunk={}s operation={}s",
        config.network.handshake_timeout_secs,
        config.network.chunk_timeout_secs,
        config.network.operation_timeout_secs
    );
    tracing::info!("  Max payload: {} bytes", config.limits.max_payload_bytes);

    // External commands take precedence; everything else falls back to lopdf
    let command_timeout = config
        .engine
        .command_timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.network.operation_timeout());
    let commands = CommandEngine::new(config.engine.command_map()).with_timeout(command_timeout);
    if commands.is_empty() {
        tracing::info!("  External commands: none");
    } else {
        for action in config.engine.commands.keys() {
            tracing::info!("  External command: {}", action);
        }
    }
    let engine = RoutingEngine::new().with(commands).with(LopdfEngine::new());

    std::fs::create_dir_all(&config.workspace.temp_root)?;

    let server = Arc::new(Server::new(ServerConfig::from(&config), Arc::new(engine)));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    let stats = server.stats();
    tracing::info!(
        "Server stopped ({} connections, {} succeeded, {} failed)",
        stats.connections_total.load(Ordering::Relaxed),
        stats.sessions_succeeded.load(Ordering::Relaxed),
        stats.sessions_failed.load(Ordering::Relaxed)
    );
    Ok(())
}
