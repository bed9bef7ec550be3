pub mod builders;
pub mod fake_recorder;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

use snapvisor::events::RunEvent;
use snapvisor::supervisor::{Run, RunHandle};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// Drain every event of a run, then return them with the terminal `Run`.
pub async fn collect_run(mut handle: RunHandle) -> (Vec<RunEvent>, Run) {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    let run = handle.wait().await.expect("run worker failed");
    (events, run)
}

/// Output lines in event order.
pub fn output_lines(events: &[RunEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Output(line) => Some(line.clone()),
            _ => None,
        })
        .collect()
}

/// Progress values in event order.
pub fn progress_values(events: &[RunEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .collect()
}

/// Number of `Finished` events.
pub fn finished_count(events: &[RunEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RunEvent::Finished(_)))
        .count()
}
