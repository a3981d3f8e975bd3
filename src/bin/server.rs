//! wa-gateway-server - HTTP gateway managing WhatsApp sessions

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use wa_gateway::config::Config;
use wa_gateway::server::GatewayServer;

#[derive(Parser)]
#[command(name = "wa-gateway-server")]
#[command(about = "wa-gateway HTTP server")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for session auth material
    #[arg(long)]
    sessions_dir: Option<std::path::PathBuf>,

    /// Disable the /simulate routes
    #[arg(long)]
    no_simulation: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(dir) = cli.sessions_dir {
        config.server.sessions_dir = Some(dir);
    }
    if cli.no_simulation {
        config.server.enable_simulation = false;
    }

    let server = GatewayServer::bind(&config).await?;
    tracing::info!(
        "Starting wa-gateway server on http://{}",
        server.local_addr()?
    );

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            // Keep the sender alive so the server is not stopped by the drop
            std::future::pending::<()>().await;
        }
        let _ = shutdown_tx.send(()).await;
    });

    server.run(shutdown_rx).await
}
