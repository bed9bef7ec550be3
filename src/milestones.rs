// src/milestones.rs

//! Output-line classification into coarse progress milestones.
//!
//! The backup script does not report a numeric progress value. Instead we
//! look for a handful of known phrases in its output and map each one to a
//! fixed percentage.

use serde::Deserialize;

/// One `(pattern, percent)` entry of the milestone table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Milestone {
    /// Substring looked up in each output line.
    pub pattern: String,
    /// Progress reported when `pattern` is found, in `0..=100`.
    pub percent: u8,
}

impl Milestone {
    pub fn new(pattern: impl Into<String>, percent: u8) -> Self {
        Self {
            pattern: pattern.into(),
            percent,
        }
    }
}

/// Ordered, immutable milestone table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneTable {
    entries: Vec<Milestone>,
}

impl MilestoneTable {
    pub fn new(entries: Vec<Milestone>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Milestone] {
        &self.entries
    }

    /// Map an output line to a progress percentage.
    ///
    /// Returns `None` if no pattern occurs in `line`. If several patterns
    /// occur, the highest percent wins, so the result does not depend on the
    /// order of the table.
    pub fn classify(&self, line: &str) -> Option<u8> {
        self.entries
            .iter()
            .filter(|m| line.contains(m.pattern.as_str()))
            .map(|m| m.percent)
            .max()
    }
}

impl Default for MilestoneTable {
    fn default() -> Self {
        Self::new(vec![
            Milestone::new("Formatting", 25),
            Milestone::new("mounted successfully", 50),
            Milestone::new("Starting backup", 75),
            Milestone::new("Backup completed successfully", 100),
        ])
    }
}
