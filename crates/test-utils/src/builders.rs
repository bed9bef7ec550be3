#![allow(dead_code)]

use std::time::Duration;

use snapvisor::config::{
    CommandSection, ConfigFile, DEFAULT_KILL_GRACE, DurationValue, ManualSection, RawConfigFile,
    RecordSection,
};
use snapvisor::milestones::{Milestone, MilestoneTable};
use snapvisor::supervisor::{CommandSpec, RunSpec};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                command: CommandSection::default(),
                record: RecordSection::default(),
                manual: ManualSection::default(),
                milestone: None,
            },
        }
    }

    pub fn program(mut self, program: &str) -> Self {
        self.config.command.program = program.to_string();
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.config.command.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn timeout(mut self, timeout: &str) -> Self {
        self.config.command.timeout = Some(DurationValue::from(timeout));
        self
    }

    pub fn kill_grace(mut self, grace: &str) -> Self {
        self.config.command.kill_grace = Some(DurationValue::from(grace));
        self
    }

    pub fn milestone(mut self, pattern: &str, percent: u8) -> Self {
        self.config
            .milestone
            .get_or_insert_with(Vec::new)
            .push(Milestone::new(pattern, percent));
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `RunSpec` that runs a `sh -c` script as the backup command.
pub struct ScriptSpecBuilder {
    script: String,
    timeout: Duration,
    kill_grace: Duration,
    milestones: MilestoneTable,
}

impl ScriptSpecBuilder {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.to_string(),
            timeout: Duration::from_secs(30),
            kill_grace: DEFAULT_KILL_GRACE,
            milestones: MilestoneTable::default(),
        }
    }

    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn milestones(mut self, milestones: MilestoneTable) -> Self {
        self.milestones = milestones;
        self
    }

    pub fn build(self) -> RunSpec {
        RunSpec {
            command: CommandSpec::new("sh", vec!["-c".to_string(), self.script]),
            timeout: self.timeout,
            kill_grace: self.kill_grace,
            milestones: self.milestones,
        }
    }
}

/// A `RunSpec` whose program does not exist.
pub fn missing_program_spec() -> RunSpec {
    RunSpec {
        command: CommandSpec::new("/nonexistent/snapvisor-backup-script", Vec::new()),
        timeout: Duration::from_secs(30),
        kill_grace: DEFAULT_KILL_GRACE,
        milestones: MilestoneTable::default(),
    }
}
