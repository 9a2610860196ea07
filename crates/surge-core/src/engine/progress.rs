use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::model::RunLength;
use crate::engine::aggregator::compute_stats;
use crate::results::RequestResult;

/// Number of most recent results the windowed figures are computed over.
pub const PROGRESS_WINDOW: usize = 100;

/// Partial view of a running test, taken at a phase checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProgressSnapshot {
    /// Label of the phase that just completed.
    pub phase: String,
    pub completed: u64,
    /// `None` for duration-bounded runs.
    pub total: Option<u64>,
    /// 0 to 100, by request count or by elapsed time.
    pub percentage: f64,
    pub elapsed_ms: u64,
    /// Throughput of the trailing window over the time since run start.
    pub window_rps: f64,
    pub window_mean_ms: f64,
    /// Failed requests since run start.
    pub error_count: u64,
}

/// Receives progress snapshots. Called synchronously by the scheduler
/// between phases, never after the run has returned.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

impl ProgressObserver for mpsc::UnboundedSender<ProgressSnapshot> {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.send(snapshot.clone());
    }
}

/// Build a snapshot from the run log (in completion order).
pub fn snapshot(
    log: &[RequestResult],
    phase: String,
    length: &RunLength,
    elapsed: Duration,
) -> ProgressSnapshot {
    let completed = log.len() as u64;
    let window = &log[log.len().saturating_sub(PROGRESS_WINDOW)..];
    let window_stats = compute_stats(window, elapsed);
    let error_count = log.iter().filter(|r| r.is_failed()).count() as u64;

    let (total, percentage) = match *length {
        RunLength::Requests { total } => {
            let pct = if total > 0 {
                completed as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (Some(total), pct)
        }
        RunLength::Duration { seconds } => {
            let budget = seconds as f64;
            let pct = if budget > 0.0 {
                (elapsed.as_secs_f64() / budget * 100.0).min(100.0)
            } else {
                0.0
            };
            (None, pct)
        }
    };

    ProgressSnapshot {
        phase,
        completed,
        total,
        percentage,
        elapsed_ms: elapsed.as_millis() as u64,
        window_rps: window_stats.requests_per_second,
        window_mean_ms: window_stats.mean_response_ms,
        error_count,
    }
}
