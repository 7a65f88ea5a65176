//! tta: test agent daemon
//!
//! Runs inside a test VM. Dials out to the test driver and serves HTTP over
//! each dialed connection, and serves the same handlers on a loopback
//! diagnostics listener.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tta_agent::handlers::{diagnostics_router, reverse_router};
use tta_agent::logbuf::LogBuffer;
use tta_agent::server::HttpServer;
use tta_agent::tunnel::ReverseDial;
use tta_agent::AgentState;
use tta_core::config::{self, AgentConfig};
use tta_core::error::ListenerError;

#[derive(Parser)]
#[command(name = "tta")]
#[command(about = "tta - test agent that dials out to the test driver")]
#[command(version)]
struct Args {
    /// Driver address to dial (host:port)
    #[arg(long, env = "TTA_DRIVER")]
    driver: Option<String>,

    /// Loopback address for the diagnostics listener
    #[arg(long)]
    diag_address: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Never install firewall rules, even where supported
    #[arg(long)]
    no_firewall: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr and into the buffer served by /logs
    let log_buffer = LogBuffer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(log_buffer.clone()),
        )
        .init();

    tracing::info!("Starting tta agent");

    let config = load_agent_config(&args);
    tracing::info!("Driver address: {}", config.driver_address);

    let state = Arc::new(AgentState::new(config.clone(), log_buffer));
    if !state.firewall.is_supported() {
        tracing::info!("Firewall setup unavailable on this host");
    }

    // Diagnostics listener: failing to bind is fatal
    let diag_listener = TcpListener::bind(&config.diag_address)
        .await
        .with_context(|| format!("failed to bind diagnostics listener on {}", config.diag_address))?;
    let diagnostics = HttpServer::new("diagnostics", diagnostics_router(Arc::clone(&state)));
    tokio::spawn(async move {
        if let Err(e) = diagnostics.serve(diag_listener).await {
            tracing::error!("Diagnostics server stopped: {}", e);
        }
    });

    let cancel = CancellationToken::new();
    let ReverseDial {
        supervisor,
        listener,
        tracker,
        ..
    } = ReverseDial::from_config(&config);
    let supervisor = tokio::spawn(supervisor.run(cancel.clone()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down..."),
            Err(e) => tracing::warn!("Failed to listen for Ctrl+C: {}", e),
        }
        shutdown.cancel();
    });

    let reverse = HttpServer::new("reverse", reverse_router(state)).with_conn_state(tracker);
    let result = reverse.serve(listener).await;

    supervisor.await.context("supervisor task panicked")?;

    match result {
        Err(ListenerError::Closed) if cancel.is_cancelled() => {
            tracing::info!("tta agent stopped");
            Ok(())
        }
        Err(e) => Err(e).context("reverse-dial server failed"),
        Ok(()) => Ok(()),
    }
}

/// Load the config file, then apply command-line overrides
fn load_agent_config(args: &Args) -> AgentConfig {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", config_path, e);
            AgentConfig::default()
        })
    } else {
        AgentConfig::default()
    };

    if let Some(driver) = &args.driver {
        config.driver_address = driver.clone();
    }
    if let Some(diag_address) = &args.diag_address {
        config.diag_address = diag_address.clone();
    }
    if args.no_firewall {
        config.firewall_enabled = false;
    }

    config
}
