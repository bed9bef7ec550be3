// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::config::duration::DurationValue;
use crate::milestones::{Milestone, MilestoneTable};
use crate::recorder::DEFAULT_RECORD_PATH;
use crate::supervisor::{CommandSpec, RunSpec};

/// Timeout applied when `[command].timeout` is absent.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// How long a stopped run waits between SIGTERM and SIGKILL.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [command]
/// program = "sudo"
/// args = ["./snapshot.sh"]
/// timeout = "1h"
/// kill_grace = "5s"
///
/// [record]
/// path = "last_run.json"
///
/// [manual]
/// approved_serial = "ADD-YOUR-SN"
///
/// [[milestone]]
/// pattern = "Formatting"
/// percent = 25
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub command: CommandSection,

    #[serde(default)]
    pub record: RecordSection,

    #[serde(default)]
    pub manual: ManualSection,

    /// `[[milestone]]` entries. `None` keeps the built-in table; a present
    /// list replaces it entirely.
    #[serde(default)]
    pub milestone: Option<Vec<Milestone>>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`) or
/// `Default`, so every field is known to be usable.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub command: CommandSpec,
    pub timeout: Duration,
    pub kill_grace: Duration,
    pub record: RecordSection,
    pub manual: ManualSection,
    pub milestones: MilestoneTable,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        command: CommandSpec,
        timeout: Duration,
        kill_grace: Duration,
        record: RecordSection,
        manual: ManualSection,
        milestones: MilestoneTable,
    ) -> Self {
        Self {
            command,
            timeout,
            kill_grace,
            record,
            manual,
            milestones,
        }
    }

    /// Everything the supervisor needs to launch a run.
    pub fn run_spec(&self) -> RunSpec {
        RunSpec {
            command: self.command.clone(),
            timeout: self.timeout,
            kill_grace: self.kill_grace,
            milestones: self.milestones.clone(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let command = CommandSection::default();
        Self::new_unchecked(
            CommandSpec::new(command.program, command.args),
            DEFAULT_TIMEOUT,
            DEFAULT_KILL_GRACE,
            RecordSection::default(),
            ManualSection::default(),
            MilestoneTable::default(),
        )
    }
}

/// `[command]` section: the privileged backup command.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandSection {
    #[serde(default = "default_program")]
    pub program: String,

    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// `"90m"`, `"3600s"`, or a bare number of seconds.
    #[serde(default)]
    pub timeout: Option<DurationValue>,

    /// Grace period between SIGTERM and SIGKILL when a run is stopped.
    #[serde(default)]
    pub kill_grace: Option<DurationValue>,
}

fn default_program() -> String {
    "sudo".to_string()
}

fn default_args() -> Vec<String> {
    vec!["./snapshot.sh".to_string()]
}

impl Default for CommandSection {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            timeout: None,
            kill_grace: None,
        }
    }
}

/// `[record]` section: where the last-run timestamp lives.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RecordSection {
    #[serde(default = "default_record_path")]
    pub path: PathBuf,
}

fn default_record_path() -> PathBuf {
    PathBuf::from(DEFAULT_RECORD_PATH)
}

impl Default for RecordSection {
    fn default() -> Self {
        Self {
            path: default_record_path(),
        }
    }
}

/// `[manual]` section: static text shown by `snapvisor manual`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ManualSection {
    #[serde(default = "default_approved_serial")]
    pub approved_serial: String,

    #[serde(default = "default_methodology")]
    pub methodology: String,
}

fn default_approved_serial() -> String {
    "ADD-YOUR-SN".to_string()
}

fn default_methodology() -> String {
    "Incremental BTRFS Snapshots".to_string()
}

impl Default for ManualSection {
    fn default() -> Self {
        Self {
            approved_serial: default_approved_serial(),
            methodology: default_methodology(),
        }
    }
}
