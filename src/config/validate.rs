// src/config/validate.rs

use std::collections::HashSet;
use std::time::Duration;

use crate::config::model::{ConfigFile, DEFAULT_KILL_GRACE, DEFAULT_TIMEOUT, RawConfigFile};
use crate::errors::{Result, SnapvisorError};
use crate::milestones::{Milestone, MilestoneTable};
use crate::supervisor::CommandSpec;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SnapvisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_command(&raw)?;
        let timeout = resolve_timeout(&raw)?;
        let kill_grace = resolve_kill_grace(&raw)?;
        let milestones = resolve_milestones(raw.milestone)?;

        Ok(ConfigFile::new_unchecked(
            CommandSpec::new(raw.command.program, raw.command.args),
            timeout,
            kill_grace,
            raw.record,
            raw.manual,
            milestones,
        ))
    }
}

fn validate_command(cfg: &RawConfigFile) -> Result<()> {
    if cfg.command.program.trim().is_empty() {
        return Err(SnapvisorError::ConfigError(
            "[command].program must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn resolve_timeout(cfg: &RawConfigFile) -> Result<Duration> {
    let Some(ref raw) = cfg.command.timeout else {
        return Ok(DEFAULT_TIMEOUT);
    };

    let timeout = raw.to_duration().map_err(|e| {
        SnapvisorError::ConfigError(format!("[command].timeout '{}': {}", raw, e))
    })?;

    if timeout.is_zero() {
        return Err(SnapvisorError::ConfigError(
            "[command].timeout must be greater than zero".to_string(),
        ));
    }

    Ok(timeout)
}

/// Zero is allowed and means SIGKILL follows SIGTERM immediately.
fn resolve_kill_grace(cfg: &RawConfigFile) -> Result<Duration> {
    let Some(ref raw) = cfg.command.kill_grace else {
        return Ok(DEFAULT_KILL_GRACE);
    };

    raw.to_duration().map_err(|e| {
        SnapvisorError::ConfigError(format!("[command].kill_grace '{}': {}", raw, e))
    })
}

fn resolve_milestones(raw: Option<Vec<Milestone>>) -> Result<MilestoneTable> {
    let Some(entries) = raw else {
        return Ok(MilestoneTable::default());
    };

    if entries.is_empty() {
        return Err(SnapvisorError::ConfigError(
            "[[milestone]] list must not be empty when given".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for m in entries.iter() {
        if m.pattern.is_empty() {
            return Err(SnapvisorError::ConfigError(
                "milestone pattern must not be empty".to_string(),
            ));
        }
        if m.percent > 100 {
            return Err(SnapvisorError::ConfigError(format!(
                "milestone '{}' has percent {} (must be 0..=100)",
                m.pattern, m.percent
            )));
        }
        if !seen.insert(m.pattern.as_str()) {
            return Err(SnapvisorError::ConfigError(format!(
                "duplicate milestone pattern '{}'",
                m.pattern
            )));
        }
    }

    Ok(MilestoneTable::new(entries))
}
