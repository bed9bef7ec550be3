// src/supervisor/worker.rs

//! The per-run worker: spawn the backup process, pump its output, and turn
//! whatever happens into a terminal `Run`.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::events::{EventSender, RunEvent};
use crate::milestones::MilestoneTable;
use crate::recorder::CompletionRecorder;
use crate::types::RunStatus;

use super::run::Run;
use super::{CommandSpec, RunSpec};

/// How the supervised process stopped being supervised.
enum Outcome {
    Exited(ExitStatus),
    Cancelled,
    TimedOut,
    StreamError(io::Error),
    WaitError(io::Error),
}

/// Appends lines to the run log and forwards the matching events.
struct Reporter {
    run: Run,
    events: EventSender,
}

impl Reporter {
    fn output(&mut self, line: String) {
        self.run.push_line(line.clone());
        // A subscriber that went away is not a reason to stop the backup.
        let _ = self.events.send(RunEvent::Output(line));
    }

    fn line(&mut self, bytes: &[u8], milestones: &MilestoneTable) {
        let text = String::from_utf8_lossy(bytes);
        let line = text.trim_end().to_string();
        let percent = milestones.classify(&line);

        self.output(line);

        if let Some(percent) = percent {
            if self.run.advance(percent) {
                debug!(run_id = self.run.id(), percent, "progress milestone reached");
                let _ = self.events.send(RunEvent::Progress(percent));
            }
        }
    }

    fn finish(self, status: RunStatus) -> Run {
        self.run.finish(status)
    }
}

/// Drive one run from spawn to terminal status.
///
/// Never fails: spawn errors, stream errors, timeouts and cancellation all
/// become a terminal status plus one explanatory output line. The `Finished`
/// event is not sent here; the caller's finish guard owns that.
pub(crate) async fn drive_run(
    id: u64,
    spec: Arc<RunSpec>,
    recorder: Arc<dyn CompletionRecorder>,
    events: EventSender,
    cancel_rx: oneshot::Receiver<()>,
) -> Run {
    let mut reporter = Reporter {
        run: Run::start(id),
        events,
    };
    let deadline = deadline_after(spec.timeout);

    info!(
        run_id = id,
        cmd = %spec.command,
        timeout_secs = spec.timeout.as_secs(),
        "starting backup process"
    );

    let (mut child, output) = match spawn_combined(&spec.command) {
        Ok(spawned) => spawned,
        Err(err) => {
            error!(run_id = id, program = %spec.command.program, error = %err, "failed to spawn backup process");
            reporter.output(format!(
                "Error: failed to start {}: {}",
                spec.command.program, err
            ));
            return reporter.finish(RunStatus::Failed);
        }
    };

    let outcome = supervise(
        &mut child,
        output,
        &mut reporter,
        &spec.milestones,
        deadline,
        cancel_rx,
    )
    .await;

    match outcome {
        Outcome::Exited(status) => {
            let code = status.code();
            reporter.run.set_exit_code(code);
            info!(
                run_id = id,
                exit_code = code,
                success = status.success(),
                "backup process exited"
            );

            if status.success() {
                // The run counts as completed whether or not the record sticks.
                if let Err(err) = recorder.record_completion(Local::now()) {
                    warn!(run_id = id, error = %err, "failed to record run completion");
                }
                reporter.finish(RunStatus::Completed)
            } else {
                reporter.output(match code {
                    Some(code) => format!("Backup process exited with status {}.", code),
                    None => "Backup process was terminated by a signal.".to_string(),
                });
                reporter.finish(RunStatus::Failed)
            }
        }
        Outcome::Cancelled => {
            info!(run_id = id, "cancellation requested; stopping backup process");
            terminate(&mut child, spec.kill_grace, id).await;
            reporter.output("Backup stopped by user.".to_string());
            reporter.finish(RunStatus::Cancelled)
        }
        Outcome::TimedOut => {
            warn!(run_id = id, timeout_secs = spec.timeout.as_secs(), "backup process timed out; stopping it");
            terminate(&mut child, spec.kill_grace, id).await;
            reporter.output(format!(
                "Backup process timed out after {}.",
                describe_duration(spec.timeout)
            ));
            reporter.finish(RunStatus::TimedOut)
        }
        Outcome::StreamError(err) => {
            error!(run_id = id, error = %err, "reading backup output failed");
            terminate(&mut child, spec.kill_grace, id).await;
            reporter.output(format!("Error: reading process output: {}", err));
            reporter.finish(RunStatus::Failed)
        }
        Outcome::WaitError(err) => {
            error!(run_id = id, error = %err, "waiting for backup process failed");
            reporter.output(format!("Error: waiting for backup process: {}", err));
            reporter.finish(RunStatus::Failed)
        }
    }
}

/// Spawn `command` with stdout and stderr both writing into one pipe, so the
/// reader sees the streams in the order the process wrote them.
fn spawn_combined(command: &CommandSpec) -> io::Result<(Child, pipe::Receiver)> {
    let (writer, reader) = pipe::pipe()?;
    let stdout = writer.into_blocking_fd()?;
    let stderr = stdout.try_clone()?;

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);

    let child = cmd.spawn()?;

    // `cmd` still holds our copies of the write end; EOF only arrives once
    // they are closed.
    drop(cmd);

    Ok((child, reader))
}

/// Resolves only on an explicit cancel request; a dropped sender never
/// cancels.
async fn cancelled(cancel_rx: oneshot::Receiver<()>) {
    if cancel_rx.await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Pump output lines until EOF, then wait for the exit status.
///
/// Both phases race against the cancel signal and the deadline, so a silent
/// child is still stopped on time.
async fn supervise(
    child: &mut Child,
    output: pipe::Receiver,
    reporter: &mut Reporter,
    milestones: &MilestoneTable,
    deadline: Instant,
    cancel_rx: oneshot::Receiver<()>,
) -> Outcome {
    let cancel = cancelled(cancel_rx);
    let timer = sleep_until(deadline);
    tokio::pin!(cancel);
    tokio::pin!(timer);

    let mut segments = BufReader::new(output).split(b'\n');

    loop {
        tokio::select! {
            biased;

            () = &mut cancel => return Outcome::Cancelled,
            () = &mut timer => return Outcome::TimedOut,
            segment = segments.next_segment() => match segment {
                Ok(Some(bytes)) => reporter.line(&bytes, milestones),
                Ok(None) => break,
                Err(err) => return Outcome::StreamError(err),
            },
        }
    }

    debug!(run_id = reporter.run.id(), "output stream closed; waiting for exit status");

    tokio::select! {
        biased;

        () = &mut cancel => Outcome::Cancelled,
        () = &mut timer => Outcome::TimedOut,
        status = child.wait() => match status {
            Ok(status) => Outcome::Exited(status),
            Err(err) => Outcome::WaitError(err),
        },
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    // Absurdly large timeouts collapse to "effectively never".
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}

/// SIGTERM the child, give it `grace` to exit, then SIGKILL.
///
/// `sudo` relays SIGTERM to the command it runs; SIGKILL only stops `sudo`.
/// The child stays in our process group so `sudo` can still prompt on the
/// terminal.
async fn terminate(child: &mut Child, grace: Duration, run_id: u64) {
    // `None` once the child has been reaped.
    let Some(pid) = child.id() else {
        return;
    };

    send_signal(pid, libc::SIGTERM, run_id);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(run_id, exit_code = status.code(), "backup process exited after SIGTERM");
        }
        Ok(Err(e)) => {
            warn!(run_id, error = %e, "waiting for backup process after SIGTERM failed");
        }
        Err(_) => {
            warn!(
                run_id,
                grace_ms = grace.as_millis() as u64,
                "backup process ignored SIGTERM; sending SIGKILL"
            );
            if let Err(e) = child.kill().await {
                warn!(run_id, error = %e, "failed to kill backup process");
            }
        }
    }
}

fn send_signal(pid: u32, signal: libc::c_int, run_id: u64) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };

    // SAFETY: kill(2) only takes integers. The child is not reaped yet, so
    // `pid` cannot have been reused.
    let rc = unsafe { libc::kill(pid, signal) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        warn!(run_id, pid, signal, error = %err, "signalling backup process failed");
    }
}

/// "1 hour", "90 minutes", "45 seconds", "250 ms".
fn describe_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d.subsec_nanos() != 0 || secs == 0 {
        return format!("{} ms", d.as_millis());
    }
    let (value, unit) = if secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if value == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", value, unit)
    }
}
