use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// RunLength
// ---------------------------------------------------------------------------

/// How long a run lasts: a fixed number of requests or a wall-clock budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunLength {
    /// Dispatch exactly `total` requests.
    Requests { total: u64 },
    /// Keep dispatching phases until `seconds` have elapsed.
    Duration { seconds: u64 },
}

impl Default for RunLength {
    fn default() -> Self {
        Self::Requests { total: 100 }
    }
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// The attack pattern driving a run. Chosen once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    /// Every request contends for permits at once.
    #[default]
    Burst,
    /// Back-to-back phases of `concurrency` requests.
    Sustained,
    /// Concurrency climbs from `start_concurrency` to `end_concurrency`.
    RampUp {
        start_concurrency: u32,
        end_concurrency: u32,
        step: u32,
        ramp_up_time_ms: u64,
    },
    /// Three equal waves separated by a fixed pause.
    Wave,
    /// A long phase at reduced concurrency followed by a short one at full
    /// concurrency.
    Spike,
}

impl Pattern {
    pub fn name(&self) -> &'static str {
        match self {
            Pattern::Burst => "burst",
            Pattern::Sustained => "sustained",
            Pattern::RampUp { .. } => "ramp_up",
            Pattern::Wave => "wave",
            Pattern::Spike => "spike",
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// TestConfig
// ---------------------------------------------------------------------------

/// Everything needed to run one load test. Immutable for the duration of a
/// run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TestConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Target URL.
    pub target: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub concurrency: u32,
    #[serde(default)]
    pub length: RunLength,
    #[serde(default)]
    pub pattern: Pattern,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Pause between sustained phases.
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_name() -> String {
    "Load Test".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl TestConfig {
    /// A GET burst against `target` with default timeout and no delay.
    pub fn new(target: impl Into<String>, concurrency: u32, total_requests: u64) -> Self {
        Self {
            name: default_name(),
            target: target.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: None,
            concurrency,
            length: RunLength::Requests {
                total: total_requests,
            },
            pattern: Pattern::Burst,
            timeout_ms: default_timeout_ms(),
            delay_ms: 0,
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_duration_secs(mut self, seconds: u64) -> Self {
        self.length = RunLength::Duration { seconds };
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Total request count for count-bounded runs.
    pub fn total_requests(&self) -> Option<u64> {
        match self.length {
            RunLength::Requests { total } => Some(total),
            RunLength::Duration { .. } => None,
        }
    }
}
