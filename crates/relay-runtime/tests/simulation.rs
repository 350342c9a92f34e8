//! # Simulation Tests
//!
//! Runs the full relay against the in-process network the binary uses.

use relay_runtime::{RuntimeConfig, SimulationHarness};
use warp_relay::domain::invariant_gap_free_nonces;
use warp_relay::{shutdown_channel, TaskExit};

fn config(validators: usize, threshold: u64, messages: usize) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.simulation.validators = validators;
    config.simulation.tx_timeout_secs = 10;
    config.relay.aggregator.threshold = threshold;
    config.relay.aggregator.expected_messages = messages;
    config
}

#[tokio::test]
async fn test_simulation_relays_every_message() {
    let harness = SimulationHarness::new(config(5, 4, 8)).unwrap();
    let chain = harness.chain().clone();
    let (_trigger, signal) = shutdown_channel();

    let report = harness.run(signal).await.unwrap();

    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.relayed, 8);
    assert_eq!(chain.message_count(), 8);
    assert!(invariant_gap_free_nonces(0, &report.nonces));
    assert_eq!(report.pipeline.aggregator.as_ref().unwrap(), &TaskExit::Completed);
}

#[tokio::test]
async fn test_simulation_with_starting_nonce() {
    let mut config = config(3, 2, 3);
    config.relay.transmitter.starting_nonce = 100;
    let harness = SimulationHarness::new(config).unwrap();
    let (_trigger, signal) = shutdown_channel();

    let report = harness.run(signal).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.nonces, vec![100, 101, 102]);
}

#[tokio::test]
async fn test_single_validator_quorum() {
    let harness = SimulationHarness::new(config(1, 1, 2)).unwrap();
    assert_eq!(harness.validators().len(), 1);
    let (_trigger, signal) = shutdown_channel();

    let report = harness.run(signal).await.unwrap();
    assert!(report.is_success());
}

#[test]
fn test_log_bus_holds_every_announcement() {
    let harness = SimulationHarness::new(config(1, 1, 10_000)).unwrap();
    assert!(harness.chain().log_buffer() >= 10_000);

    let harness = SimulationHarness::new(config(1, 1, 3)).unwrap();
    assert!(harness.chain().log_buffer() >= 3);
}

#[tokio::test]
async fn test_stop_signal_interrupts_run() {
    let harness = SimulationHarness::new(config(4, 3, 5)).unwrap();
    let (trigger, signal) = shutdown_channel();
    trigger.trigger();

    let report = harness.run(signal).await.unwrap();

    assert!(report.interrupted);
    assert!(!report.is_success());
    assert_eq!(report.relayed, 0);
}

#[tokio::test]
async fn test_unreachable_threshold_fails_to_start() {
    let harness = SimulationHarness::new(config(2, 3, 1)).unwrap();
    let (_trigger, signal) = shutdown_channel();
    assert!(harness.run(signal).await.is_err());
}

#[test]
fn test_invalid_relayer_key_rejected() {
    let mut config = config(2, 1, 1);
    config.simulation.relayer_key = Some("not-hex".to_string());
    assert!(SimulationHarness::new(config).is_err());
}
