use consentry_browser::{BrowserSettings, TimeoutConfig};
use consentry_engine::ScanConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything the binary needs to wire a scan, loaded from one JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: BrowserSettings,
    pub timeouts: TimeoutConfig,
    /// `fast` or `patient`; replaces `timeouts` when set
    pub timeout_preset: Option<String>,
    pub scan: ScanConfig,
    pub classifier_url: String,
    pub output_dir: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            browser: BrowserSettings::default(),
            timeouts: TimeoutConfig::default(),
            timeout_preset: None,
            scan: ScanConfig::default(),
            classifier_url: "http://127.0.0.1:8088".to_string(),
            output_dir: "./consentry-data".to_string(),
        }
    }
}

impl AppConfig {
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let content = tokio::fs::read_to_string(path).await?;
                Ok(serde_json::from_str(&content)?)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn timeout_config(&self) -> TimeoutConfig {
        match &self.timeout_preset {
            Some(name) => TimeoutConfig::preset(name),
            None => self.timeouts,
        }
    }
}
