// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod events;
pub mod fs;
pub mod logging;
pub mod milestones;
pub mod recorder;
pub mod supervisor;
pub mod types;

use std::sync::Arc;

use anyhow::{Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, CliCommand};
use crate::config::{ConfigFile, load_or_default};
use crate::events::RunEvent;
use crate::fs::{FileSystem, RealFileSystem};
use crate::recorder::RunRecorder;
use crate::supervisor::Supervisor;
use crate::types::RunStatus;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the last-run recorder
/// - the run supervisor and its event stream
/// - Ctrl-C handling (cancels the active run)
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(args.config.as_deref())?;
    let recorder = RunRecorder::new(RealFileSystem, cfg.record.path.clone());

    match args.command {
        CliCommand::Run { dry_run: true } => {
            print_dry_run(&cfg, &recorder);
            Ok(())
        }
        CliCommand::Run { dry_run: false } => run_backup(&cfg, recorder).await,
        CliCommand::LastRun => {
            println!("{}", recorder.last_run());
            Ok(())
        }
        CliCommand::Manual => {
            print_manual(&cfg, &recorder);
            Ok(())
        }
    }
}

/// Start one run, stream its events to stdout, and map the terminal status
/// to the process result.
async fn run_backup(cfg: &ConfigFile, recorder: RunRecorder<RealFileSystem>) -> Result<()> {
    let supervisor = Supervisor::new(cfg.run_spec(), Arc::new(recorder));
    let mut handle = supervisor.start()?;

    // Ctrl-C → cancel the active run. The run loop below still waits for
    // `Finished`, so the process is killed before we exit.
    let ctrl_c = {
        let supervisor = supervisor.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                if let Err(e) = supervisor.cancel() {
                    debug!(error = %e, "Ctrl+C received with no active run");
                    return;
                }
            }
        })
    };

    while let Some(event) = handle.next_event().await {
        match event {
            RunEvent::Output(line) => println!("{line}"),
            RunEvent::Progress(percent) => println!("[{percent:>3}%]"),
            RunEvent::Finished(status) => info!(run_id = handle.id(), %status, "run finished"),
        }
    }

    ctrl_c.abort();
    let run = handle.wait().await?;

    let elapsed_secs = run
        .finished_at()
        .map(|end| (end - run.started_at()).num_seconds())
        .unwrap_or(0);
    info!(
        run_id = run.id(),
        status = %run.status(),
        progress = run.progress(),
        lines = run.log().len(),
        elapsed_secs,
        "backup run summary"
    );

    match run.status() {
        RunStatus::Completed => Ok(()),
        status => {
            warn!(run_id = run.id(), %status, "backup did not complete");
            Err(anyhow!("backup run {}", status))
        }
    }
}

/// Simple dry-run output: print command, timeouts, milestones and record path.
fn print_dry_run<F: FileSystem>(cfg: &ConfigFile, recorder: &RunRecorder<F>) {
    println!("snapvisor dry-run");
    println!("  command:    {}", cfg.command);
    println!("  timeout:    {:?}", cfg.timeout);
    println!("  kill grace: {:?}", cfg.kill_grace);
    println!("  record:     {}", recorder.path().display());
    println!("  last run:   {}", recorder.last_run());
    println!();

    println!("milestones ({}):", cfg.milestones.entries().len());
    for m in cfg.milestones.entries() {
        println!("  - {:>3}%  {:?}", m.percent, m.pattern);
    }

    debug!("dry-run complete (no execution)");
}

fn print_manual<F: FileSystem>(cfg: &ConfigFile, recorder: &RunRecorder<F>) {
    println!("Approved SNs");
    println!("Approved Serial Number: {}", cfg.manual.approved_serial);
    println!("Backup Methodology: {}", cfg.manual.methodology);
    println!("Last Run: {}", recorder.last_run());
}
