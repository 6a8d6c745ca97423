#![forbid(unsafe_code)]
//! LinkChain node: peer listener, optional bootstrap peer and HTTP surface.

use clap::Parser;
use colored::*;
use linkchain::api::run_api_server;
use linkchain::config::{load_config_from, DEFAULT_CONFIG_PATH};
use linkchain::node::{Node, NodeSettings};
use linkchain::protocol::Framing;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "linkchain-node", version, about = "Run a LinkChain node")]
struct Cli {
    /// Path to the TOML configuration file (optional)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Address to accept peer connections on (overrides NODE_ADDRESS)
    #[arg(long)]
    node_address: Option<String>,

    /// Address to serve the HTTP API on (overrides API_ADDRESS)
    #[arg(long)]
    api_address: Option<String>,

    /// Peer to connect to at start-up (overrides INITIAL_PEER)
    #[arg(long)]
    peer: Option<String>,

    /// Wire framing: newline or length-prefixed
    #[arg(long)]
    framing: Option<Framing>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("linkchain=info,linkchain_node=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config_from(&cli.config)?;
    if let Some(addr) = cli.node_address {
        config.node_address = addr;
    }
    if let Some(addr) = cli.api_address {
        config.api_address = addr;
    }
    if let Some(peer) = cli.peer {
        config.initial_peer = Some(peer);
    }
    if let Some(framing) = cli.framing {
        config.framing = framing;
    }
    config.validate()?;

    println!("{}", "LinkChain node".bright_cyan().bold());
    println!("{}", "--------------".bright_cyan());
    println!("  p2p:     {}", config.node_address.bright_white());
    println!("  api:     {}", config.api_address.bright_white());
    println!("  framing: {}", config.framing.to_string().bright_white());
    println!();

    let node = Node::new(NodeSettings::from(&config));

    // Failing to bind the peer listener is the one fatal start-up error.
    node.listen(&config.node_address).await?;

    if let Some(peer) = &config.initial_peer {
        match node.connect_to_peer(peer).await {
            Ok(()) => info!("Connected to bootstrap peer {}", peer),
            Err(e) => warn!("Continuing without bootstrap peer: {}", e),
        }
    }

    let shutdown_node = node.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
        shutdown_node.shutdown().await;
    };

    run_api_server(node, &config.api_address, shutdown).await?;
    Ok(())
}
