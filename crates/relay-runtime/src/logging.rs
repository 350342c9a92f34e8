//! Logging setup.
//!
//! The subscriber goes in before configuration is read so that warnings
//! about rejected overrides are visible. Once the configuration is loaded
//! its `log_level` replaces the bootstrap filter, unless `RUST_LOG` is set.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, reload, EnvFilter, FmtSubscriber};

/// Handle to the installed subscriber's filter.
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, fmt::Formatter>,
    from_env: bool,
}

impl LogHandle {
    /// Switch to `level`. No-op when `RUST_LOG` chose the filter.
    pub fn apply_level(&self, level: &str) -> Result<()> {
        if self.from_env {
            return Ok(());
        }
        let filter = parse_filter(level)?;
        self.filter
            .reload(filter)
            .map_err(|e| anyhow!("Failed to reload log filter: {}", e))
    }
}

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_level` when set.
pub fn init_logging(default_level: &str) -> Result<LogHandle> {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (parse_filter(default_level)?, false),
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_filter_reloading();
    let handle = builder.reload_handle();
    tracing::subscriber::set_global_default(builder.finish())?;

    Ok(LogHandle {
        filter: handle,
        from_env,
    })
}

fn parse_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| anyhow!("Invalid log filter {:?}: {}", level, e))
}
