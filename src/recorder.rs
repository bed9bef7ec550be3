// src/recorder.rs

//! Persistence of the "last successful run" timestamp.
//!
//! The record is a single small JSON document that is overwritten on every
//! completed run:
//!
//! ```json
//! {"completionTimestamp":"2026-10-19T21:04:11.512+02:00"}
//! ```
//!
//! Older installs wrote the same value under a `date` key; that spelling is
//! still accepted on read.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::Result;
use crate::fs::FileSystem;

/// Default location of the record, relative to the working directory.
pub const DEFAULT_RECORD_PATH: &str = "last_run.json";

/// On-disk shape of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastRunRecord {
    #[serde(rename = "completionTimestamp", alias = "date")]
    pub completion_timestamp: String,
}

/// Result of looking up the last successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastRun {
    Never,
    At(String),
}

impl fmt::Display for LastRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastRun::Never => f.write_str("Never"),
            LastRun::At(ts) => f.write_str(ts),
        }
    }
}

/// Seam through which the supervisor reports a completed run.
///
/// Production code uses [`RunRecorder`]; tests can count calls instead.
pub trait CompletionRecorder: Send + Sync {
    fn record_completion(&self, at: DateTime<Local>) -> Result<()>;
}

/// Reads and writes the last-run record through a [`FileSystem`].
#[derive(Debug, Clone)]
pub struct RunRecorder<F: FileSystem> {
    fs: F,
    path: PathBuf,
}

impl<F: FileSystem> RunRecorder<F> {
    pub fn new(fs: F, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record.
    ///
    /// A missing file is `Ok(None)`. Unreadable or malformed content is an
    /// error; callers that only want a display value should use
    /// [`RunRecorder::last_run`].
    pub fn load(&self) -> Result<Option<LastRunRecord>> {
        let Some(contents) = self.fs.read_to_string(&self.path)? else {
            return Ok(None);
        };
        let record: LastRunRecord = serde_json::from_str(&contents)?;
        Ok(Some(record))
    }

    /// Timestamp of the last successful run, or `Never`.
    ///
    /// Read failures of any kind count as "no prior run".
    pub fn last_run(&self) -> LastRun {
        match self.load() {
            Ok(Some(record)) => LastRun::At(record.completion_timestamp),
            Ok(None) => LastRun::Never,
            Err(err) => {
                debug!(path = ?self.path, error = %err, "last-run record unreadable; treating as never");
                LastRun::Never
            }
        }
    }
}

impl<F: FileSystem> CompletionRecorder for RunRecorder<F> {
    fn record_completion(&self, at: DateTime<Local>) -> Result<()> {
        let record = LastRunRecord {
            completion_timestamp: at.to_rfc3339(),
        };
        let json = serde_json::to_vec(&record)?;
        self.fs.write(&self.path, &json)?;
        info!(path = ?self.path, at = %record.completion_timestamp, "recorded run completion");
        Ok(())
    }
}
