//! # Warp Relay
//!
//! Runs the relay pipeline against an in-process source chain and validator
//! set, relaying the configured number of test messages. Ctrl+C stops the
//! run early.

use anyhow::{bail, Result};
use relay_runtime::{bootstrap_log_level, init_logging, load_config, SimulationHarness};
use tracing::{error, info};
use warp_relay::shutdown_channel;

#[tokio::main]
async fn main() -> Result<()> {
    let logging = init_logging(&bootstrap_log_level())?;
    let config = load_config()?;
    logging.apply_level(&config.log_level)?;
    info!("Starting warp relay v{}", relay_runtime::VERSION);

    let (trigger, signal) = shutdown_channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, shutting down");
                trigger.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let harness = SimulationHarness::new(config)?;
    let report = harness.run(signal).await?;

    if let Some(first) = report.nonces.first() {
        info!(
            "Relayed {} of {} messages, nonces {}..={}",
            report.relayed,
            report.sent,
            first,
            report.nonces.last().unwrap_or(first)
        );
    }
    if !report.is_success() && !report.interrupted {
        bail!("Relay run did not complete: {:?}", report.pipeline);
    }
    Ok(())
}
