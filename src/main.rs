//! wa-gateway - command-line client for a running gateway server

use anyhow::Result;
use clap::{Parser, Subcommand};
use wa_gateway::client::{commands, GatewayClient};
use wa_gateway::config::Config;

#[derive(Parser)]
#[command(name = "wa-gateway")]
#[command(about = "Manage WhatsApp connections on a wa-gateway server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Server base URL (overrides config)
    #[arg(short, long)]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new connection
    Create {
        /// Display name
        name: String,
        /// Use this connection id instead of a generated one
        #[arg(long)]
        id: Option<String>,
    },
    /// List connections
    List,
    /// Show the status of a connection
    Status { id: String },
    /// Show the pairing QR code
    Qr {
        id: String,
        /// Print the image data URL instead of rendering in the terminal
        #[arg(long)]
        data_url: bool,
    },
    /// Send a message through a connected session
    Send {
        id: String,
        /// Phone number or chat address
        to: String,
        message: String,
    },
    /// Disconnect and remove a connection
    Disconnect { id: String },
    /// Replace the current QR code with a fresh one
    Refresh { id: String },
    /// Pair a connection on a simulating server
    Pair {
        id: String,
        /// Phone number to bind
        phone: String,
    },
    /// Poll until the connection is paired
    Watch { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let server_url = cli
        .server
        .unwrap_or_else(|| config.client.server_url.clone());
    let client = GatewayClient::new(server_url);

    match cli.command {
        Commands::Create { name, id } => commands::create(&client, &name, id.as_deref()).await,
        Commands::List => commands::list(&client).await,
        Commands::Status { id } => commands::status(&client, &id).await,
        Commands::Qr { id, data_url } => commands::show_qr(&client, &id, data_url).await,
        Commands::Send { id, to, message } => commands::send(&client, &id, &to, &message).await,
        Commands::Disconnect { id } => commands::disconnect(&client, &id).await,
        Commands::Refresh { id } => commands::refresh(&client, &id).await,
        Commands::Pair { id, phone } => commands::pair(&client, &id, &phone).await,
        Commands::Watch { id } => {
            tracing::info!("Watching connection: {}", id);
            commands::watch(&client, &id, &config.client).await
        }
    }
}
