use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Tunables of a scan. Every field has a default so partial JSON files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Wall-clock budget for enumerating a root's interactive elements
    pub discovery_budget_ms: u64,
    /// DOM counts as quiescent after this long without mutations
    pub quiet_interval_ms: u64,
    /// Upper bound on any single quiescence wait
    pub quiescence_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Other-classified elements probed for a second level when no Settings element exists
    pub max_probe_candidates: usize,
    pub forced_action_samples: usize,
    pub color_distance_threshold: f64,
    pub reclassify_after_ms: i64,
    pub cookie_history_cap: usize,
    /// Same-origin pages visited after each successful interaction
    pub exploration_links: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            discovery_budget_ms: 20_000,
            quiet_interval_ms: 500,
            quiescence_timeout_ms: 10_000,
            poll_interval_ms: 100,
            max_probe_candidates: 2,
            forced_action_samples: 20,
            color_distance_threshold: 5.0,
            reclassify_after_ms: 120_000,
            cookie_history_cap: 10,
            exploration_links: 3,
        }
    }
}

impl ScanConfig {
    pub fn discovery_budget(&self) -> Duration {
        Duration::from_millis(self.discovery_budget_ms)
    }

    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms)
    }

    pub fn quiescence_timeout(&self) -> Duration {
        Duration::from_millis(self.quiescence_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_exploration_links(mut self, links: usize) -> Self {
        self.exploration_links = links;
        self
    }

    pub fn with_quiescence(mut self, quiet_ms: u64, timeout_ms: u64) -> Self {
        self.quiet_interval_ms = quiet_ms;
        self.quiescence_timeout_ms = timeout_ms;
        self
    }

    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}
