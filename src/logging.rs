// src/logging.rs

//! Diagnostics for the supervisor itself.
//!
//! The backup's own output goes to stdout as run events; everything logged
//! here goes to stderr. The level comes from `--log-level`, else
//! `SNAPVISOR_LOG`, else `info`.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Install the stderr subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = cli_level
        .map(Level::from)
        .or_else(|| level_from_env("SNAPVISOR_LOG"))
        .unwrap_or(Level::INFO);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("initialising logging: {e}"))
}

/// Unset or unparsable values are ignored.
fn level_from_env(var: &str) -> Option<Level> {
    std::env::var(var).ok()?.trim().parse().ok()
}
