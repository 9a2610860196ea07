use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::results::{CompletedRun, RequestResult, TestStats};

// ---------------------------------------------------------------------------
// TimeBucketEntry: serializable time-series entry for charting
// ---------------------------------------------------------------------------

/// Requests issued during one second of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimeBucketEntry {
    /// Seconds since the run started.
    pub second: u64,
    pub requests: u64,
    pub errors: u64,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
}

struct BucketStats {
    requests: u64,
    errors: u64,
    sum_ms: u64,
    min_ms: u64,
    max_ms: u64,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Nearest-rank percentile of an ascending sample.
///
/// `p` must be in the range (0.0, 100.0]. Returns 0 for an empty sample.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    let idx = idx.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

/// Reduce a set of results into [`TestStats`].
///
/// Pure: the same results and wall time always give the same stats.
/// Response-time figures only consider results with a non-zero elapsed time.
pub fn compute_stats(results: &[RequestResult], wall_time: Duration) -> TestStats {
    let total = results.len() as u64;

    let mut status_code_distribution: BTreeMap<u16, u64> = BTreeMap::new();
    let mut error_distribution: BTreeMap<String, u64> = BTreeMap::new();
    let mut successful = 0u64;
    let mut total_bytes = 0u64;
    let mut times: Vec<u64> = Vec::with_capacity(results.len());

    for r in results {
        if let Some(status) = r.status_code() {
            *status_code_distribution.entry(status).or_insert(0) += 1;
        }
        if let Some(error) = r.error() {
            *error_distribution.entry(error.to_string()).or_insert(0) += 1;
        }
        if r.is_success() {
            successful += 1;
        }
        total_bytes += r.size_bytes;
        if r.elapsed_ms > 0 {
            times.push(r.elapsed_ms);
        }
    }

    times.sort_unstable();

    let mean_response_ms = if times.is_empty() {
        0.0
    } else {
        times.iter().sum::<u64>() as f64 / times.len() as f64
    };

    let success_rate = if total > 0 {
        successful as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    let wall_secs = wall_time.as_secs_f64();
    let requests_per_second = if wall_secs > 0.0 {
        total as f64 / wall_secs
    } else {
        0.0
    };

    TestStats {
        total_requests: total,
        successful_requests: successful,
        failed_requests: total - successful,
        success_rate,
        min_response_ms: times.first().copied().unwrap_or(0),
        max_response_ms: times.last().copied().unwrap_or(0),
        mean_response_ms,
        p50_response_ms: percentile(&times, 50.0),
        p90_response_ms: percentile(&times, 90.0),
        p95_response_ms: percentile(&times, 95.0),
        p99_response_ms: percentile(&times, 99.0),
        requests_per_second,
        total_bytes,
        wall_time_ms: wall_time.as_millis() as u64,
        status_code_distribution,
        error_distribution,
    }
}

/// Stats for a finished run.
pub fn run_stats(run: &CompletedRun) -> TestStats {
    compute_stats(&run.results, run.wall_time())
}

/// Per-second time series keyed by when each request was issued.
pub fn time_series(run: &CompletedRun) -> Vec<TimeBucketEntry> {
    let mut buckets: BTreeMap<u64, BucketStats> = BTreeMap::new();

    for r in &run.results {
        let second = (r.issued_at - run.started_at).num_seconds().max(0) as u64;
        let bucket = buckets.entry(second).or_insert(BucketStats {
            requests: 0,
            errors: 0,
            sum_ms: 0,
            min_ms: u64::MAX,
            max_ms: 0,
        });
        bucket.requests += 1;
        if r.is_failed() {
            bucket.errors += 1;
        }
        bucket.sum_ms += r.elapsed_ms;
        bucket.min_ms = bucket.min_ms.min(r.elapsed_ms);
        bucket.max_ms = bucket.max_ms.max(r.elapsed_ms);
    }

    buckets
        .into_iter()
        .map(|(second, bucket)| TimeBucketEntry {
            second,
            requests: bucket.requests,
            errors: bucket.errors,
            avg_ms: bucket.sum_ms as f64 / bucket.requests as f64,
            min_ms: if bucket.min_ms == u64::MAX {
                0
            } else {
                bucket.min_ms
            },
            max_ms: bucket.max_ms,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
