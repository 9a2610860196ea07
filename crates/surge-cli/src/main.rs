//! surge - headless load generator

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use surge_core::config::{ensure_valid, read_config, write_config};
use surge_core::engine::ProgressSnapshot;
use surge_core::http::HttpTransport;
use surge_core::results::export::write_export;
use surge_core::{run_test, SurgeError, TestConfig, TestRunResult};

mod cli;

use cli::{Cli, Commands, RunArgs};

const EXIT_REQUEST_FAILURES: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Validate { config } => match read_config(&config).await.and_then(|c| {
            ensure_valid(&c)?;
            Ok(c)
        }) {
            Ok(c) => {
                println!("{}: ok ({} pattern)", config.display(), c.pattern);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", config.display());
                ExitCode::from(EXIT_CONFIG_ERROR)
            }
        },
    }
}

async fn run(args: RunArgs) -> ExitCode {
    let config = match load_config(&args).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    if let Some(path) = &args.save_config {
        if let Err(e) = write_config(&config, path).await {
            eprintln!("failed to save config to {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    let transport = match HttpTransport::builder()
        .danger_accept_invalid_certs(args.insecure)
        .build()
    {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        url = %config.target,
        pattern = %config.pattern,
        concurrency = config.concurrency,
        "surge starting"
    );

    let observer = |s: &ProgressSnapshot| {
        tracing::info!(
            phase = %s.phase,
            completed = s.completed,
            errors = s.error_count,
            rps = s.window_rps,
            mean_ms = s.window_mean_ms,
            "{:.0}% complete",
            s.percentage
        );
    };

    let result = match run_test(config, Arc::new(transport), Some(Box::new(observer))).await {
        Ok(r) => r,
        Err(e @ SurgeError::Config(_)) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            return ExitCode::FAILURE;
        }
    };

    print_summary(&result);

    if let Some(path) = &args.output {
        let format = args.export_format();
        match write_export(&result, format, path).await {
            Ok(()) => println!("Report written to {}", path.display()),
            Err(e) => {
                eprintln!("failed to write report to {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    if args.fail_on_error && result.stats.failed_requests > 0 {
        return ExitCode::from(EXIT_REQUEST_FAILURES);
    }
    ExitCode::SUCCESS
}

async fn load_config(args: &RunArgs) -> Result<TestConfig, SurgeError> {
    match &args.config {
        Some(path) => read_config(path).await.map_err(|e| match e {
            SurgeError::Config(_) => e,
            other => SurgeError::Config(format!("cannot load {}: {other}", path.display())),
        }),
        None => args.to_config(),
    }
}

fn print_summary(result: &TestRunResult) {
    let s = &result.stats;
    println!();
    println!("{} ({})", result.config.name, result.config.pattern);
    println!("  Target:      {} {}", result.config.method, result.config.target);
    println!("  Duration:    {:.2}s", s.wall_time_ms as f64 / 1000.0);
    println!(
        "  Requests:    {} total, {} ok, {} failed ({:.2}% success)",
        s.total_requests, s.successful_requests, s.failed_requests, s.success_rate
    );
    println!("  Throughput:  {:.2} req/s", s.requests_per_second);
    println!(
        "  Latency:     min {}ms  mean {:.1}ms  max {}ms",
        s.min_response_ms, s.mean_response_ms, s.max_response_ms
    );
    println!(
        "  Percentiles: p50 {}ms  p90 {}ms  p95 {}ms  p99 {}ms",
        s.p50_response_ms, s.p90_response_ms, s.p95_response_ms, s.p99_response_ms
    );
    if !s.status_code_distribution.is_empty() {
        let codes: Vec<String> = s
            .status_code_distribution
            .iter()
            .map(|(code, n)| format!("{code}={n}"))
            .collect();
        println!("  Status:      {}", codes.join(" "));
    }
    if !s.error_distribution.is_empty() {
        let errors: Vec<String> = s
            .error_distribution
            .iter()
            .map(|(reason, n)| format!("{reason}={n}"))
            .collect();
        println!("  Errors:      {}", errors.join(" "));
    }
}
