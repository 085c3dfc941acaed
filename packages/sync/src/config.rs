use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "storyforge.config.json";

/// StoryForge sync configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    /// Quiet period before an edit is persisted
    pub debounce_ms: u64,

    /// Retry policy for auxiliary saves (diagram layouts)
    pub retry: RetryPolicy,

    /// Largest accepted image upload
    pub max_upload_bytes: usize,

    /// Undo levels kept per editing session (0 = unlimited)
    pub history_depth: usize,

    /// Collection documents are stored in
    pub collection: String,
}

impl SyncConfig {
    /// Load config from a directory
    pub fn load(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: SyncConfig = serde_json::from_str(&content)?;
            tracing::info!(path = %config_path.display(), "Loaded sync config");
            Ok(config)
        } else {
            Ok(SyncConfig::default())
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            retry: RetryPolicy::default(),
            max_upload_bytes: crate::blob::MAX_IMAGE_BYTES,
            history_depth: 100,
            collection: "documents".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "debounceMs": 500,
            "retry": { "maxRetries": 5 },
            "collection": "chapters"
        }"#;

        let config: SyncConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.collection, "chapters");
        assert_eq!(config.history_depth, 100);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), r#"{ "historyDepth": 0 }"#).unwrap();

        let config = SyncConfig::load(dir.path()).unwrap();
        assert_eq!(config.history_depth, 0);
        assert_eq!(config.debounce_ms, 2000);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ nope").unwrap();
        assert!(SyncConfig::load(dir.path()).is_err());
    }
}
