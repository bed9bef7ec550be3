use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use snapvisor::errors::{Result, SnapvisorError};
use snapvisor::recorder::CompletionRecorder;

/// A fake recorder that:
/// - remembers every completion it was asked to record
/// - optionally fails every write, like a read-only disk would.
#[derive(Debug, Clone, Default)]
pub struct FakeRecorder {
    recorded: Arc<Mutex<Vec<DateTime<Local>>>>,
    fail: bool,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            recorded: Arc::default(),
            fail: true,
        }
    }

    /// How many times `record_completion` was called.
    pub fn calls(&self) -> usize {
        self.recorded.lock().unwrap().len()
    }
}

impl CompletionRecorder for FakeRecorder {
    fn record_completion(&self, at: DateTime<Local>) -> Result<()> {
        self.recorded.lock().unwrap().push(at);
        if self.fail {
            return Err(SnapvisorError::IoError(std::io::Error::other(
                "read-only file system",
            )));
        }
        Ok(())
    }
}
