// src/supervisor/mod.rs

//! Run supervisor.
//!
//! Owns at most one backup run at a time:
//!
//! - [`Supervisor::start`] claims the single run slot and spawns a Tokio task
//!   that drives the backup process (see [`worker`]).
//! - [`Supervisor::cancel`] asks the active run to stop its process group.
//! - Progress, output and completion reach the caller as [`RunEvent`]s on the
//!   [`RunHandle`] returned by `start`.
//!
//! The run slot is released and `Finished` is emitted from a drop guard, so
//! both happen on every exit path of the worker, panics included.

pub mod run;
pub mod worker;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, SnapvisorError};
use crate::events::{self, EventReceiver, EventSender, RunEvent};
use crate::milestones::MilestoneTable;
use crate::recorder::CompletionRecorder;
use crate::types::RunStatus;

pub use run::Run;

/// Program and arguments of the backup command.
///
/// Arguments are passed as discrete argv elements, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Everything fixed about a run before it starts.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub command: CommandSpec,
    pub timeout: Duration,
    /// Wait between SIGTERM and SIGKILL when the run is stopped.
    pub kill_grace: Duration,
    pub milestones: MilestoneTable,
}

/// The run currently holding the slot.
#[derive(Debug)]
struct ActiveRun {
    id: u64,
    cancel: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Default)]
struct SlotState {
    active: Option<ActiveRun>,
    last_status: RunStatus,
}

fn lock_slot(slot: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the run slot and emits `Finished` when the worker task ends,
/// however it ends.
struct FinishGuard {
    slot: Arc<Mutex<SlotState>>,
    run_id: u64,
    events: EventSender,
    status: RunStatus,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        {
            let mut slot = lock_slot(&self.slot);
            if slot.active.as_ref().map(|a| a.id) == Some(self.run_id) {
                slot.active = None;
            }
            slot.last_status = self.status;
        }

        debug!(run_id = self.run_id, status = %self.status, "run finished");
        let _ = self.events.send(RunEvent::Finished(self.status));
    }
}

/// Handle to a started run.
#[derive(Debug)]
pub struct RunHandle {
    id: u64,
    events: EventReceiver,
    join: JoinHandle<Run>,
}

impl RunHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event of the run; `None` once `Finished` has been delivered.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Wait for the worker and return the terminal run.
    ///
    /// Events not yet consumed are discarded.
    pub async fn wait(self) -> Result<Run> {
        self.join
            .await
            .map_err(|e| SnapvisorError::WorkerFailed(e.to_string()))
    }
}

/// Single-flight supervisor for the backup command.
///
/// Cloning is cheap and every clone controls the same run slot.
#[derive(Clone)]
pub struct Supervisor {
    spec: Arc<RunSpec>,
    recorder: Arc<dyn CompletionRecorder>,
    slot: Arc<Mutex<SlotState>>,
    next_id: Arc<AtomicU64>,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("spec", &self.spec)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub fn new(spec: RunSpec, recorder: Arc<dyn CompletionRecorder>) -> Self {
        Self {
            spec: Arc::new(spec),
            recorder,
            slot: Arc::new(Mutex::new(SlotState::default())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a new run.
    ///
    /// Must be called from within a Tokio runtime. Fails with
    /// `AlreadyRunning` while another run holds the slot; nothing is spawned
    /// in that case.
    pub fn start(&self) -> Result<RunHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SnapvisorError::WorkerFailed(format!("no Tokio runtime: {}", e)))?;

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let id = {
            let mut slot = lock_slot(&self.slot);
            if let Some(active) = slot.active.as_ref() {
                warn!(active_run = active.id, "start rejected; a run is already in progress");
                return Err(SnapvisorError::AlreadyRunning);
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            slot.active = Some(ActiveRun {
                id,
                cancel: Some(cancel_tx),
            });
            id
        };

        let (events_tx, events_rx) = events::channel();
        let guard = FinishGuard {
            slot: Arc::clone(&self.slot),
            run_id: id,
            events: events_tx.clone(),
            status: RunStatus::Failed,
        };
        let spec = Arc::clone(&self.spec);
        let recorder = Arc::clone(&self.recorder);

        info!(run_id = id, "backup run started");

        let join = runtime.spawn(async move {
            let mut guard = guard;
            let run = worker::drive_run(id, spec, recorder, events_tx, cancel_rx).await;
            guard.status = run.status();
            run
        });

        Ok(RunHandle {
            id,
            events: events_rx,
            join,
        })
    }

    /// Ask the active run to stop.
    ///
    /// Fails with `NotRunning` when no run holds the slot. Repeated calls
    /// during the same run are accepted and have no further effect.
    pub fn cancel(&self) -> Result<()> {
        let mut slot = lock_slot(&self.slot);
        let Some(active) = slot.active.as_mut() else {
            return Err(SnapvisorError::NotRunning);
        };

        match active.cancel.take() {
            Some(cancel) => {
                info!(run_id = active.id, "cancellation requested for active run");
                if cancel.send(()).is_err() {
                    debug!(run_id = active.id, "run already finishing while cancelling");
                }
            }
            None => {
                debug!(run_id = active.id, "cancellation already requested");
            }
        }

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        lock_slot(&self.slot).active.is_some()
    }

    /// `Running` while a run is active, otherwise the status of the last
    /// finished run (`Idle` if there was none).
    pub fn status(&self) -> RunStatus {
        let slot = lock_slot(&self.slot);
        if slot.active.is_some() {
            RunStatus::Running
        } else {
            slot.last_status
        }
    }
}
