//! # Warp Relay Runtime
//!
//! Process-level wiring for the warp relay: configuration loading, logging
//! setup and the end-to-end simulation the binary runs.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, else `WARP_LOG_LEVEL`, else `info`)
//! 2. Load configuration (defaults, JSON file, `WARP_*` environment) and
//!    switch to its log level unless `RUST_LOG` is set
//! 3. Build the in-process source chain and validator set
//! 4. Start the relay pipeline and submit test messages
//! 5. Verify every relay transaction, then shut down

#![warn(clippy::all)]

pub mod config;
pub mod logging;
pub mod simulation;

pub use config::{
    bootstrap_log_level, load_config, load_config_with, RuntimeConfig, SimulationConfig,
    CONFIG_FILE_ENV, DEFAULT_LOG_LEVEL,
};
pub use logging::{init_logging, LogHandle};
pub use simulation::{SimulationHarness, SimulationReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
