// src/supervisor/run.rs

use chrono::{DateTime, Local};

use crate::types::RunStatus;

/// One execution of the backup command.
///
/// The worker owns and mutates a `Run` while it is running and hands it back
/// by value once it is terminal; after that nothing changes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    id: u64,
    status: RunStatus,
    started_at: DateTime<Local>,
    finished_at: Option<DateTime<Local>>,
    progress: u8,
    exit_code: Option<i32>,
    log: Vec<String>,
}

impl Run {
    pub(crate) fn start(id: u64) -> Self {
        Self {
            id,
            status: RunStatus::Running,
            started_at: Local::now(),
            finished_at: None,
            progress: 0,
            exit_code: None,
            log: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Local>> {
        self.finished_at
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Exit code of the child, if it exited on its own with one.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Every output line of the run, in arrival order.
    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub(crate) fn push_line(&mut self, line: String) {
        self.log.push(line);
    }

    /// Raise progress to `percent`. Lower values are rejected.
    pub(crate) fn advance(&mut self, percent: u8) -> bool {
        if percent < self.progress {
            return false;
        }
        self.progress = percent;
        true
    }

    pub(crate) fn set_exit_code(&mut self, code: Option<i32>) {
        self.exit_code = code;
    }

    pub(crate) fn finish(mut self, status: RunStatus) -> Self {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.finished_at = Some(Local::now());
        self
    }
}
