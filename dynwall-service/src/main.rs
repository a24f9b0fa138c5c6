//! Dynwall
//!
//! One binary, two modes: `server` (default) serves the HTTP API, `worker`
//! runs the job lifecycle loop. A process never runs both.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dynwall_service::config::Config;
use dynwall_service::context::AppContext;
use dynwall_service::{api, worker};

#[derive(Parser)]
#[command(name = "dynwall")]
#[command(about = "Dynamic wallpaper builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Clone, Copy, Debug, Default)]
enum Mode {
    /// Serve the HTTP API
    #[default]
    Server,
    /// Process queued jobs
    Worker,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dynwall_service=info,dynwall=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mode = cli.mode.unwrap_or_default();

    info!("Starting dynwall in {:?} mode", mode);

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    config.log_summary();

    let ctx = AppContext::connect(config).await?;

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let result = match mode {
        Mode::Server => api::serve(ctx, shutdown).await,
        Mode::Worker => worker::run_worker(ctx, shutdown).await,
    };

    if let Err(e) = &result {
        error!("{:?} mode exited with error: {:#}", mode, e);
    }
    result
}

/// Cancels `shutdown` on Ctrl-C
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });
}
