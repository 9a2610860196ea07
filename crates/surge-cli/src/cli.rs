//! Command-line arguments and their translation into a `TestConfig`.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use surge_core::config::model::HttpMethod;
use surge_core::results::export::ExportFormat;
use surge_core::{Pattern, RunLength, SurgeError, TestConfig};

#[derive(Parser)]
#[command(name = "surge")]
#[command(author, version, about = "Concurrency-controlled HTTP load generator", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a load test
    Run(RunArgs),
    /// Validate a configuration file without sending any requests
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatternArg {
    Burst,
    Sustained,
    RampUp,
    Wave,
    Spike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
    Csv,
}

impl From<FormatArg> for ExportFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Json => ExportFormat::Json,
            FormatArg::Csv => ExportFormat::Csv,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Load the test configuration from a JSON file instead of flags
    #[arg(long, conflicts_with = "url")]
    pub config: Option<PathBuf>,

    /// Target URL
    #[arg(short, long, required_unless_present = "config")]
    pub url: Option<String>,

    /// Test name shown in reports
    #[arg(long)]
    pub name: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: HttpMethod,

    /// Request header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    pub body: Option<String>,

    /// Maximum number of requests in flight
    #[arg(short, long, default_value_t = 10)]
    pub concurrency: u32,

    /// Total number of requests to send
    #[arg(short = 'n', long, default_value_t = 100, conflicts_with = "duration")]
    pub requests: u64,

    /// Run for this many seconds instead of a fixed request count (sustained only)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Attack pattern
    #[arg(short, long, value_enum, default_value = "burst")]
    pub pattern: PatternArg,

    /// Ramp-up: starting concurrency
    #[arg(long)]
    pub start_concurrency: Option<u32>,

    /// Ramp-up: final concurrency
    #[arg(long)]
    pub end_concurrency: Option<u32>,

    /// Ramp-up: concurrency increment per plateau
    #[arg(long)]
    pub step: Option<u32>,

    /// Ramp-up: total time spent climbing, in milliseconds
    #[arg(long)]
    pub ramp_up_time_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Pause between sustained phases in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,

    /// Accept invalid TLS certificates
    #[arg(short = 'k', long)]
    pub insecure: bool,

    /// Write the full run report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format; inferred from the output extension when omitted
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Save the effective configuration to this file before running
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Exit with status 1 when any request failed
    #[arg(long)]
    pub fail_on_error: bool,
}

impl RunArgs {
    /// Build a config from flags. Does not handle `--config`.
    pub fn to_config(&self) -> Result<TestConfig, SurgeError> {
        let target = self
            .url
            .clone()
            .ok_or_else(|| SurgeError::Config("a target URL is required".to_string()))?;

        let length = match self.duration {
            Some(seconds) => RunLength::Duration { seconds },
            None => RunLength::Requests {
                total: self.requests,
            },
        };

        let mut config = TestConfig::new(target, self.concurrency, self.requests);
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        config.method = self.method;
        config.headers = parse_headers(&self.headers)?;
        config.body = self.body.clone();
        config.length = length;
        config.pattern = self.pattern()?;
        config.timeout_ms = self.timeout_ms;
        config.delay_ms = self.delay_ms;
        Ok(config)
    }

    fn pattern(&self) -> Result<Pattern, SurgeError> {
        Ok(match self.pattern {
            PatternArg::Burst => Pattern::Burst,
            PatternArg::Sustained => Pattern::Sustained,
            PatternArg::Wave => Pattern::Wave,
            PatternArg::Spike => Pattern::Spike,
            PatternArg::RampUp => {
                let missing = |flag: &str| {
                    SurgeError::Config(format!("ramp-up pattern requires --{flag}"))
                };
                Pattern::RampUp {
                    start_concurrency: self
                        .start_concurrency
                        .ok_or_else(|| missing("start-concurrency"))?,
                    end_concurrency: self
                        .end_concurrency
                        .ok_or_else(|| missing("end-concurrency"))?,
                    step: self.step.ok_or_else(|| missing("step"))?,
                    ramp_up_time_ms: self
                        .ramp_up_time_ms
                        .ok_or_else(|| missing("ramp-up-time-ms"))?,
                }
            }
        })
    }

    /// Export format: explicit flag, else the output file's extension, else JSON.
    pub fn export_format(&self) -> ExportFormat {
        if let Some(f) = self.format {
            return f.into();
        }
        self.output
            .as_ref()
            .and_then(|p| p.extension())
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
            .unwrap_or(ExportFormat::Json)
    }
}

fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>, SurgeError> {
    raw.iter()
        .map(|h| {
            let (name, value) = h.split_once(':').ok_or_else(|| {
                SurgeError::Config(format!("header must look like \"Name: value\": {h}"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(SurgeError::Config(format!("header name is empty: {h}")));
            }
            Ok((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
