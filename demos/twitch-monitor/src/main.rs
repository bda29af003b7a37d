//! Runs the apps declared in `apps.yaml` until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use appstate_entities::StateBus;
use appstate_kernel::Supervisor;
use clap::Parser;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "twitch-monitor", about = "Fire TV Twitch app-state monitor")]
struct Args {
    /// Path to the apps.yaml configuration.
    #[arg(long, default_value = "apps.yaml", env = "APPS_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = appstate_config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let registry = Arc::new(appstate_apps::builtin_registry());
    let bus = StateBus::new();

    // Log every event the apps fire; this is where a home-automation bridge
    // would forward them.
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        use tokio::sync::broadcast::error::RecvError;
        loop {
            match events.recv().await {
                Ok(event) => info!(event = %event.name, payload = %event.payload, "event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut supervisor = Supervisor::new(registry, bus);
    let outcome = supervisor.load(&config);
    for (app, err) in outcome.failed() {
        warn!(app = %app, error = %err, "skipping app");
    }
    if outcome.loaded().is_empty() {
        anyhow::bail!("no apps loaded from {}", args.config.display());
    }
    supervisor.start()?;

    info!(apps = outcome.loaded().len(), "running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;

    info!("shutting down");
    supervisor.shutdown().await;
    Ok(())
}
