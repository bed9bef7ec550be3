// src/events.rs

//! Events flowing from a run's worker to whoever is watching the run.
//!
//! Each run gets its own unbounded channel. The worker never waits on the
//! subscriber, and events arrive in exactly the order they were produced.
//! `Finished` is always the last event of a run; the channel closes right
//! after it.

use tokio::sync::mpsc;

use crate::types::RunStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// One line of combined stdout/stderr, trailing whitespace removed.
    Output(String),
    /// Progress moved to this percentage.
    Progress(u8),
    /// The run reached the given terminal status.
    Finished(RunStatus),
}

pub type EventSender = mpsc::UnboundedSender<RunEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RunEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
