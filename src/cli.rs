// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `snapvisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "snapvisor",
    version,
    about = "Run a privileged snapshot backup command and supervise it.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Snapvisor.toml` in the current working directory, or the
    /// built-in defaults if that file does not exist.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SNAPVISOR_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Start a backup run and stream its output. Ctrl-C cancels the run.
    Run {
        /// Print the resolved command and milestones, but don't execute anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the time of the last successful run.
    LastRun,
    /// Print the approved serial number, backup methodology and last run.
    Manual,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
