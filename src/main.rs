//! chatrelay - WebSocket chat relay server

use anyhow::Result;
use chatrelay::config::Config;
use chatrelay::server::{log_addresses, RelayServer};
use clap::Parser;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "A WebSocket chat relay with a live roster, group chat and private messages")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Interface to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// HTML file served on GET /
    #[arg(long)]
    page: Option<std::path::PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(page) = cli.page {
        config.server.page = Some(page);
    }

    tracing::info!("Starting server...");
    let server = RelayServer::bind(&config).await?;
    log_addresses(server.local_addr()?.port());

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            // Keep the sender alive so the server keeps running
            std::future::pending::<()>().await;
        }
        let _ = shutdown_tx.send(()).await;
    });

    server.run(shutdown_rx).await?;
    tracing::info!("Server is shutting down. Goodbye!");

    Ok(())
}
