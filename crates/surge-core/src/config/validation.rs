use crate::config::model::{Pattern, RunLength, TestConfig};
use crate::error::SurgeError;

/// Validate a [`TestConfig`] and return a list of validation errors.
///
/// An empty `Vec` means the config is valid and a run may dispatch.
pub fn validate_config(config: &TestConfig) -> Vec<SurgeError> {
    let mut errors = Vec::new();

    let target = config.target.trim();
    if target.is_empty() {
        errors.push(SurgeError::Config("target URL must not be empty".to_string()));
    } else if !target.starts_with("http://") && !target.starts_with("https://") {
        errors.push(SurgeError::Config(format!(
            "target URL must start with http:// or https:// (got: {})",
            config.target
        )));
    }

    if config.concurrency == 0 {
        errors.push(SurgeError::Config(
            "concurrency must be at least 1".to_string(),
        ));
    }

    if config.timeout_ms == 0 {
        errors.push(SurgeError::Config(
            "timeout_ms must be greater than 0".to_string(),
        ));
    }

    match config.length {
        RunLength::Requests { total: 0 } => errors.push(SurgeError::Config(
            "total_requests must be greater than 0".to_string(),
        )),
        RunLength::Duration { seconds: 0 } => errors.push(SurgeError::Config(
            "duration must be greater than 0 seconds".to_string(),
        )),
        RunLength::Duration { .. } if config.pattern != Pattern::Sustained => {
            errors.push(SurgeError::Config(format!(
                "pattern '{}' requires a request count; only 'sustained' supports a duration",
                config.pattern
            )))
        }
        _ => {}
    }

    errors.extend(validate_pattern(&config.pattern));

    errors
}

fn validate_pattern(pattern: &Pattern) -> Vec<SurgeError> {
    let mut errors = Vec::new();

    if let Pattern::RampUp {
        start_concurrency,
        end_concurrency,
        step,
        ramp_up_time_ms,
    } = *pattern
    {
        if start_concurrency == 0 {
            errors.push(SurgeError::Config(
                "ramp_up: start_concurrency must be at least 1".to_string(),
            ));
        }
        if end_concurrency <= start_concurrency {
            errors.push(SurgeError::Config(format!(
                "ramp_up: end_concurrency ({end_concurrency}) must be greater than start_concurrency ({start_concurrency})"
            )));
        }
        if step == 0 {
            errors.push(SurgeError::Config(
                "ramp_up: step must be at least 1".to_string(),
            ));
        }
        if ramp_up_time_ms == 0 {
            errors.push(SurgeError::Config(
                "ramp_up: ramp_up_time_ms must be greater than 0".to_string(),
            ));
        }
    }

    errors
}

/// Collapse validation errors into a single fatal error, if there are any.
pub fn ensure_valid(config: &TestConfig) -> Result<(), SurgeError> {
    let errors = validate_config(config);
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors
        .iter()
        .map(|e| match e {
            SurgeError::Config(msg) => msg.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(SurgeError::Config(message))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
