use std::path::Path;

use crate::config::model::TestConfig;
use crate::error::SurgeError;

/// Read a JSON-serialized [`TestConfig`] from disk.
pub async fn read_config(path: impl AsRef<Path>) -> Result<TestConfig, SurgeError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let config: TestConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Write a [`TestConfig`] to disk as pretty-printed JSON.
pub async fn write_config(config: &TestConfig, path: impl AsRef<Path>) -> Result<(), SurgeError> {
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path.as_ref(), content).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{HttpMethod, Pattern};

    fn make_config() -> TestConfig {
        let mut config = TestConfig::new("https://example.com/health", 25, 500).with_pattern(
            Pattern::RampUp {
                start_concurrency: 5,
                end_concurrency: 25,
                step: 5,
                ramp_up_time_ms: 4000,
            },
        );
        config.name = "Round-Trip Config".to_string();
        config.method = HttpMethod::Post;
        config
            .headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        config.body = Some("{\"ping\":true}".to_string());
        config
    }

    #[tokio::test]
    async fn write_then_read_preserves_config() {
        let config = make_config();
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("surge.json");

        write_config(&config, &path)
            .await
            .expect("write_config should succeed");
        let loaded = read_config(&path).await.expect("read_config should succeed");

        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn read_missing_file_returns_io_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let result = read_config(dir.path().join("missing.json")).await;
        assert!(matches!(result, Err(SurgeError::Io(_))));
    }

    #[tokio::test]
    async fn read_invalid_json_returns_serde_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = read_config(&path).await;
        assert!(matches!(result, Err(SurgeError::Serde(_))));
    }
}
