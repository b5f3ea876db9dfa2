//! # Channel Broker Runtime
//!
//! Starts the broker against the in-memory adapters, plays the demo scenario
//! and keeps running until Ctrl+C.

use anyhow::{Context, Result};
use broker_runtime::{demo, BrokerRuntime, RuntimeConfig};
use broker_telemetry::{init_telemetry, TelemetryConfig};
use mc_broker::adapters::InMemoryEnvironment;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::for_component("runtime"))
        .context("Failed to initialise logging")?;

    let config = RuntimeConfig::from_env().context("Invalid runtime configuration")?;

    let env = InMemoryEnvironment::new();
    demo::seed(&env)?;
    let runtime = BrokerRuntime::start(config, env.ports());

    match demo::run(&runtime, &env).await {
        Ok(report) => info!(
            delivered = report.messages_delivered,
            refused = report.refusals,
            "Demo scenario completed"
        ),
        Err(err) => error!(error = %err, "Demo scenario failed"),
    }

    info!("Broker is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await
}
