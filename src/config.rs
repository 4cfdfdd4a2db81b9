use crate::client::RetryPolicy;
use crate::filter::FilterConfig;
use crate::model::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Rows sampled into the prompt; values above 200 are capped.
    pub sample_size: usize,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".into(),
            max_tokens: 1000,
            base_url: "https://api.anthropic.com".into(),
            api_key_env: "CLAUDE_API_KEY".into(),
            sample_size: 200,
            max_attempts: 5,
            base_delay_ms: 1000,
            timeout_secs: 60,
        }
    }
}

impl CompletionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_path: PathBuf,
    pub top_n: usize,
    pub filters: FilterConfig,
    pub completion: CompletionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("car_data.csv"),
            top_n: 5,
            filters: FilterConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        warn!("Config {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    load_config(path)
}
