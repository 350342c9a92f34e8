//! # Runtime Configuration
//!
//! Loaded in three layers: built-in defaults, an optional JSON file named by
//! `WARP_RELAY_CONFIG`, then individual `WARP_*` environment overrides.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WARP_VALIDATORS` | `simulation.validators` |
//! | `WARP_THRESHOLD` | `relay.aggregator.threshold` |
//! | `WARP_EXPECTED_MESSAGES` | `relay.aggregator.expected_messages` |
//! | `WARP_CHAIN_ID` | `relay.transmitter.chain_id` |
//! | `WARP_STARTING_NONCE` | `relay.transmitter.starting_nonce` |
//! | `WARP_RELAYER_KEY` | `simulation.relayer_key` |
//! | `WARP_LOG_LEVEL` | `log_level` |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};
use warp_relay::RelayConfig;

/// Environment variable naming the JSON configuration file.
pub const CONFIG_FILE_ENV: &str = "WARP_RELAY_CONFIG";

/// Log filter used when neither the environment nor a file sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Pipeline settings.
    pub relay: RelayConfig,
    /// In-process network the relay runs against.
    pub simulation: SimulationConfig,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let mut relay = RelayConfig::default();
        relay.aggregator.threshold = 4;
        relay.aggregator.expected_messages = 10;
        Self {
            relay,
            simulation: SimulationConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// In-process source chain and validator set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of validators, each with equal weight.
    pub validators: usize,
    /// Network id stamped into every unsigned message.
    pub network_id: u32,
    /// EVM chain id of the source chain.
    pub source_chain_id: u64,
    /// Hex secp256k1 key of the relayer; random when absent.
    pub relayer_key: Option<String>,
    /// Seconds to wait for each relay transaction.
    pub tx_timeout_secs: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            validators: 5,
            network_id: 1337,
            source_chain_id: 43112,
            relayer_key: None,
            tx_timeout_secs: 30,
        }
    }
}

/// Log level to use before the configuration has been read.
pub fn bootstrap_log_level() -> String {
    bootstrap_log_level_with(|key| std::env::var(key).ok())
}

fn bootstrap_log_level_with<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("WARP_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<RuntimeConfig> {
    load_config_with(|key| std::env::var(key).ok())
}

/// Load configuration, reading variables through `lookup`.
pub fn load_config_with<F>(lookup: F) -> Result<RuntimeConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup(CONFIG_FILE_ENV) {
        Some(path) => read_config_file(Path::new(&path))?,
        None => RuntimeConfig::default(),
    };

    override_from(&lookup, "WARP_VALIDATORS", &mut config.simulation.validators);
    override_from(&lookup, "WARP_THRESHOLD", &mut config.relay.aggregator.threshold);
    override_from(
        &lookup,
        "WARP_EXPECTED_MESSAGES",
        &mut config.relay.aggregator.expected_messages,
    );
    override_from(&lookup, "WARP_CHAIN_ID", &mut config.relay.transmitter.chain_id);
    override_from(
        &lookup,
        "WARP_STARTING_NONCE",
        &mut config.relay.transmitter.starting_nonce,
    );
    if let Some(key) = lookup("WARP_RELAYER_KEY") {
        config.simulation.relayer_key = Some(key);
    }
    if let Some(level) = lookup("WARP_LOG_LEVEL") {
        config.log_level = level;
    }

    config
        .relay
        .validate_against(config.simulation.validators as u64)
        .context("Invalid relay configuration")?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<RuntimeConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn override_from<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.parse() {
        Ok(value) => *target = value,
        Err(_) => warn!("Ignoring {}: cannot parse {:?}", key, raw),
    }
}
