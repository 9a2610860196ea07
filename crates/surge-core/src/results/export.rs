use std::path::Path;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use super::TestRunResult;
use crate::error::SurgeError;

/// File formats a run can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unsupported export format: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Export a run as CSV.
///
/// Produces leading comment lines (prefixed `#`) with the run summary, a
/// header row, then one row per result in index order.
pub fn export_csv(result: &TestRunResult) -> Result<String, SurgeError> {
    let s = &result.stats;

    let mut out = String::new();
    out.push_str(&format!("# surge load test: {}\n", result.config.name));
    out.push_str(&format!("# Run ID: {}\n", result.run_id.hyphenated()));
    out.push_str(&format!(
        "# Target: {} {}\n",
        result.config.method, result.config.target
    ));
    out.push_str(&format!("# Pattern: {}\n", result.config.pattern));
    out.push_str(&format!(
        "# Started:  {}\n",
        result
            .started_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    out.push_str(&format!(
        "# Finished: {}\n",
        result
            .finished_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    out.push_str(&format!(
        "# Duration: {:.3}s\n",
        s.wall_time_ms as f64 / 1000.0
    ));
    out.push_str(&format!("# Total requests: {}\n", s.total_requests));
    out.push_str(&format!(
        "# Successful: {} ({:.2}%)\n",
        s.successful_requests, s.success_rate
    ));
    out.push_str(&format!("# Failed: {}\n", s.failed_requests));
    out.push_str(&format!(
        "# Throughput: {:.2} req/s\n",
        s.requests_per_second
    ));
    out.push_str(&format!(
        "# P50: {}ms  P95: {}ms  P99: {}ms\n",
        s.p50_response_ms, s.p95_response_ms, s.p99_response_ms
    ));
    out.push('\n');

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "index",
        "issued_at",
        "status_code",
        "error",
        "elapsed_ms",
        "size_bytes",
        "success",
    ])?;
    for r in &result.results {
        writer.write_record([
            r.index.to_string(),
            r.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            r.status_code().map(|c| c.to_string()).unwrap_or_default(),
            r.error().unwrap_or_default().to_string(),
            r.elapsed_ms.to_string(),
            r.size_bytes.to_string(),
            r.is_success().to_string(),
        ])?;
    }
    let rows = writer
        .into_inner()
        .map_err(|e| SurgeError::Io(e.into_error()))?;
    out.push_str(&String::from_utf8_lossy(&rows));

    Ok(out)
}

// ---------------------------------------------------------------------------
// JSON export
// ---------------------------------------------------------------------------

/// Export a run as pretty-printed JSON.
pub fn export_json(result: &TestRunResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

/// Export a run and write it to `path`.
pub async fn write_export(
    result: &TestRunResult,
    format: ExportFormat,
    path: impl AsRef<Path>,
) -> Result<(), SurgeError> {
    let content = match format {
        ExportFormat::Json => export_json(result)?,
        ExportFormat::Csv => export_csv(result)?,
    };
    tokio::fs::write(path.as_ref(), content).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
