//! wglink CLI
//!
//! Drives a single WireGuard-style tunnel from a JSON connection payload:
//! bring it up and keep it until ctrl-c, or talk to a running instance
//! through the control socket.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wg_tunnel::{RawTunnelPayload, TunnelConfig, TunnelSession};
use wglink_engine::{AutoGrantBroker, TunnelController, WgQuickBackend, DEFAULT_SOCKET_PATH};

/// wglink - control surface for a single encrypted point-to-point tunnel
#[derive(Parser)]
#[command(name = "wglink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path of the control socket
    #[arg(short, long, default_value = DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the tunnel up from a payload and serve the control socket
    Run {
        /// Path to the connection payload (JSON)
        #[arg(short, long, default_value = "tunnel.json")]
        payload: PathBuf,
    },

    /// Query the status of a running instance
    Status,

    /// Ask a running instance to disconnect
    Disconnect,

    /// Validate a payload without connecting
    Check {
        /// Path to the connection payload (JSON)
        #[arg(short, long, default_value = "tunnel.json")]
        payload: PathBuf,
    },

    /// Write a sample connection payload
    GenPayload {
        /// Output path for the payload
        #[arg(short, long, default_value = "tunnel.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run { payload } => run_tunnel(cli.socket, payload).await,
        Commands::Status => status(cli.socket).await,
        Commands::Disconnect => disconnect(cli.socket).await,
        Commands::Check { payload } => check(payload),
        Commands::GenPayload { output } => gen_payload(output),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_tunnel(socket: PathBuf, payload_path: PathBuf) -> Result<()> {
    let payload = load_payload(&payload_path)?;

    let controller = Arc::new(TunnelController::new(
        TunnelSession::new(),
        Arc::new(WgQuickBackend::default_paths()),
        Arc::new(AutoGrantBroker),
    ));

    controller
        .initialize()
        .await
        .context("failed to initialize the tunnel engine")?;
    controller
        .connect(&payload)
        .await
        .context("failed to connect")?;
    info!("tunnel is up");

    #[cfg(unix)]
    {
        let server = wglink_engine::ControlServer::new(&socket, controller.clone());
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("control socket error: {}", e);
            }
        });
    }
    #[cfg(not(unix))]
    let _ = &socket;

    signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("shutting down");

    if let Err(e) = controller.disconnect().await {
        error!("disconnect failed: {}", e);
    }
    controller.teardown().await;
    Ok(())
}

#[cfg(unix)]
async fn status(socket: PathBuf) -> Result<()> {
    let client = wglink_engine::ControlClient::new(&socket);
    let status = client
        .status()
        .await
        .context("failed to query tunnel status")?;

    println!("state:      {}", status.tunnel_state);
    println!("connected:  {}", status.is_connected);
    println!(
        "permission: {}",
        if status.vpn_permission_granted {
            "granted"
        } else {
            "not granted"
        }
    );
    if let Some(err) = status.error {
        println!("error:      {}", err);
    }
    Ok(())
}

#[cfg(not(unix))]
async fn status(_socket: PathBuf) -> Result<()> {
    anyhow::bail!("the control socket is only available on Unix platforms");
}

#[cfg(unix)]
async fn disconnect(socket: PathBuf) -> Result<()> {
    let client = wglink_engine::ControlClient::new(&socket);
    client
        .disconnect()
        .await
        .context("failed to disconnect the tunnel")?;
    println!("disconnected");
    Ok(())
}

#[cfg(not(unix))]
async fn disconnect(_socket: PathBuf) -> Result<()> {
    anyhow::bail!("the control socket is only available on Unix platforms");
}

fn check(payload_path: PathBuf) -> Result<()> {
    let payload = load_payload(&payload_path)?;
    let config = TunnelConfig::validate(&payload)
        .with_context(|| format!("invalid payload {:?}", payload_path))?;

    println!("payload is valid");
    println!(
        "  addresses:  {}",
        config
            .addresses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  endpoint:   {}:{}",
        config.peer.endpoint_host, config.peer.endpoint_port
    );
    println!(
        "  routes:     {}",
        config
            .peer
            .allowed_routes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  mtu:        {}", config.mtu);
    Ok(())
}

fn gen_payload(output: PathBuf) -> Result<()> {
    let sample = serde_json::json!({
        "privateKey": "<base64 32-byte private key>",
        "publicKey": "<base64 32-byte peer public key>",
        "serverAddress": "vpn.example.com",
        "serverPort": 51820,
        "allowedIPs": ["10.8.0.2/32", "0.0.0.0/0"],
        "dns": ["1.1.1.1"],
        "mtu": 1280,
    });

    let content = serde_json::to_string_pretty(&sample)?;
    std::fs::write(&output, content)
        .with_context(|| format!("failed to write payload to {:?}", output))?;
    println!("sample payload written to {:?}", output);
    println!("fill in the key material before connecting");
    Ok(())
}

fn load_payload(path: &Path) -> Result<RawTunnelPayload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payload from {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("payload {:?} is not valid JSON", path))
}
