//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Records from crates logging through `log` (teloxide among them) are
/// forwarded to the same output.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match &config.file {
        None => match config.format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
        },
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            match config.format {
                LogFormat::Text => builder.try_init(),
                LogFormat::Json => builder.json().try_init(),
            }
        }
    };

    installed.map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
