pub mod export;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::model::TestConfig;
use crate::engine::aggregator::TimeBucketEntry;

// ---------------------------------------------------------------------------
// RequestResult: one request attempt
// ---------------------------------------------------------------------------

/// How a single request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// A response arrived. Any status code, including 4xx/5xx.
    Response { status: u16 },
    /// No response: the connection failed, was reset, or timed out.
    TransportFailure { error: String },
}

/// The immutable record of one request attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RequestResult {
    /// Position of the request within the run, starting at 0.
    pub index: u64,
    pub outcome: Outcome,
    pub elapsed_ms: u64,
    /// Serialized response headers plus body length.
    pub size_bytes: u64,
    /// Wall-clock time the request was issued.
    pub issued_at: DateTime<Utc>,
}

impl RequestResult {
    pub fn status_code(&self) -> Option<u16> {
        match self.outcome {
            Outcome::Response { status } => Some(status),
            Outcome::TransportFailure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Response { .. } => None,
            Outcome::TransportFailure { error } => Some(error),
        }
    }

    /// A response with a status below 400.
    pub fn is_success(&self) -> bool {
        self.status_code().is_some_and(|status| status < 400)
    }

    /// Status >= 400 or a transport failure.
    pub fn is_failed(&self) -> bool {
        !self.is_success()
    }
}

// ---------------------------------------------------------------------------
// CompletedRun: the frozen run log
// ---------------------------------------------------------------------------

/// A finished run: timestamps plus every result, sorted by index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompletedRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Monotonic duration of the run.
    pub wall_time_ms: u64,
    pub results: Vec<RequestResult>,
}

impl CompletedRun {
    pub fn wall_time(&self) -> Duration {
        Duration::from_millis(self.wall_time_ms)
    }
}

// ---------------------------------------------------------------------------
// TestStats: aggregated statistics
// ---------------------------------------------------------------------------

/// Statistics derived from a set of results at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TestStats {
    pub total_requests: u64,
    /// Responses with a status below 400.
    pub successful_requests: u64,
    /// Responses with status >= 400 plus transport failures.
    pub failed_requests: u64,
    /// Percentage of successful requests, 0 to 100.
    pub success_rate: f64,
    pub min_response_ms: u64,
    pub max_response_ms: u64,
    pub mean_response_ms: f64,
    pub p50_response_ms: u64,
    pub p90_response_ms: u64,
    pub p95_response_ms: u64,
    pub p99_response_ms: u64,
    pub requests_per_second: f64,
    pub total_bytes: u64,
    pub wall_time_ms: u64,
    /// Count of responses per literal status code.
    pub status_code_distribution: BTreeMap<u16, u64>,
    /// Count of transport failures per literal error string.
    pub error_distribution: BTreeMap<String, u64>,
}

// ---------------------------------------------------------------------------
// TestRunResult: complete data for a finished run
// ---------------------------------------------------------------------------

/// Complete results of a finished run, suitable for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TestRunResult {
    pub run_id: Uuid,
    pub config: TestConfig,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: TestStats,
    /// Per-second time-series data.
    pub time_series: Vec<TimeBucketEntry>,
    /// Every request result, in index order.
    pub results: Vec<RequestResult>,
}
