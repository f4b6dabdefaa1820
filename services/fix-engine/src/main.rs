//! FIX engine binary: acceptor and initiator runners

use anyhow::Result;
use clap::{Parser, Subcommand};
use fix_engine::{ClientConfig, FixClient, FixServer, ServerConfig};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fix-engine", about = "FIX 4.4 trading protocol engine")]
struct Cli {
    /// JSON config file (also read from FIX_ENGINE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the acceptor
    Server {
        /// Override the listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Connect as an initiator and hold the session
    Client {
        /// Override the server host
        #[arg(long)]
        host: Option<String>,
        /// Override the server port
        #[arg(long)]
        port: Option<u16>,
        /// Override our SenderCompID
        #[arg(long)]
        sender: Option<String>,
        /// Override the server's comp id
        #[arg(long)]
        target: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "fix_engine=info,info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var("FIX_ENGINE_CONFIG").ok().map(PathBuf::from));

    match cli.command {
        Command::Server { port } => {
            let mut config = match &config_path {
                Some(path) => {
                    info!(path = %path.display(), "loading server config");
                    ServerConfig::from_file(path)?
                }
                None => ServerConfig::default(),
            };
            if let Some(port) = port {
                config.port = port;
            }

            let server = FixServer::bind(config).await?;
            tokio::select! {
                result = server.run() => {
                    if let Err(e) = result {
                        error!(error = %e, "server stopped");
                    }
                }
                _ = signal::ctrl_c() => info!("shutdown signal received"),
            }
        }
        Command::Client {
            host,
            port,
            sender,
            target,
        } => {
            let mut config = match &config_path {
                Some(path) => {
                    info!(path = %path.display(), "loading client config");
                    ClientConfig::from_file(path)?
                }
                None => ClientConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(sender) = sender {
                config.sender_comp_id = sender;
            }
            if let Some(target) = target {
                config.target_comp_id = target;
            }

            let client = FixClient::connect(config).await?;
            client.wait_for_logon(Duration::from_secs(10)).await?;
            info!("session established; ctrl-c to log out");

            signal::ctrl_c().await?;
            client.stop().await?;
        }
    }

    info!("fix-engine shut down");
    Ok(())
}
