//! Coeus live-update daemon
//!
//! Serves the classroom WebSocket endpoints and fans out live events to
//! every connected client.
//!
//! # Usage
//!
//! ```bash
//! # Run the server (foreground)
//! coeusd serve
//!
//! # Run with a config file and a different listen address
//! coeusd serve --config /etc/coeus/live.toml --listen 127.0.0.1:9000
//!
//! # Print the effective configuration
//! coeusd check-config --config /etc/coeus/live.toml
//!
//! # Platform-style port binding
//! PORT=5000 coeusd
//!
//! # Enable debug logging
//! RUST_LOG=coeusd=debug coeusd serve
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown, closing every live connection

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use coeusd::config::LiveConfig;
use coeusd::registry::spawn_registry;
use coeusd::server::LiveServer;

/// Coeus live-update server
#[derive(Parser, Debug)]
#[command(name = "coeusd", version, about)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the live-update server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address, overriding config and environment
        #[arg(short, long)]
        listen: Option<String>,
    },
    /// Validate and print the effective configuration
    CheckConfig {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let command = args.command.unwrap_or(Command::Serve {
        config: None,
        listen: None,
    });

    match command {
        Command::Serve { config, listen } => {
            let mut config =
                LiveConfig::load(config.as_deref()).context("Failed to load configuration")?;
            if let Some(listen) = listen {
                config.listen_addr = listen;
                config.validate().context("Invalid --listen address")?;
            }
            run_server(config)
        }
        Command::CheckConfig { config } => {
            let config =
                LiveConfig::load(config.as_deref()).context("Failed to load configuration")?;
            let text = toml::to_string(&config).context("Failed to render configuration")?;
            print!("{text}");
            Ok(())
        }
    }
}

/// Runs the server (async entry point).
#[tokio::main]
async fn run_server(config: LiveConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("coeusd=info".parse()?)
                .add_directive("coeus_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Coeus live server starting"
    );

    let addr = config.socket_addr()?;

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let registry = spawn_registry();
    info!("Connection registry started");

    let server = LiveServer::new(
        addr,
        registry,
        config.connection_settings(),
        cancel_token,
    );

    info!(addr = %server.addr(), "Starting server");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Coeus live server stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
