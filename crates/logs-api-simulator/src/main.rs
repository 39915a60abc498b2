//! Standalone logs API simulator.
//!
//! Serves the Extensions and Logs API endpoints until interrupted. On Ctrl-C
//! the next `/event/next` poll receives a SHUTDOWN event, whose cycle flushes
//! any buffered logs, before the server stops.
//!
//! # Configuration
//!
//! Configuration is loaded from (in order of priority):
//! 1. Default values
//! 2. Config file: `logs-api-simulator.toml` (or the path in `LOGS_SIM_CONFIG`)
//! 3. Environment variables with `LOGS_SIM_` prefix, e.g. `LOGS_SIM_SERVER__PORT`

use anyhow::{Context, Result};
use logs_api_simulator::{Config, ShutdownReason, SimulatorBuilder};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("failed to initialise tracing subscriber")?;

    let config = Config::load().context("failed to load configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let simulator = SimulatorBuilder::from_config(config.simulator_config())
        .build()
        .await
        .context("failed to start simulator")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    simulator.request_shutdown(ShutdownReason::Spindown).await;
    let shutdown_served = simulator
        .wait_for(
            || async {
                !simulator.is_shutdown_pending().await && !simulator.is_event_outstanding()
            },
            SHUTDOWN_GRACE,
        )
        .await;
    if shutdown_served.is_err() {
        tracing::warn!(
            buffered = simulator.buffered_log_count().await,
            "No extension polled for SHUTDOWN, stopping with logs still buffered"
        );
    }

    simulator.shutdown().await;
    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,logs_api_simulator=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .context("failed to initialise tracing registry")?;

    Ok(())
}
