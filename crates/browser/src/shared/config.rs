use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Browser-side waits, in milliseconds so they load from JSON as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub navigation_ms: u64,
    /// Upper bound on waiting for `document.readyState` and network idle
    pub page_stable_ms: u64,
    pub check_interval_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            page_stable_ms: 30_000,
            check_interval_ms: 300,
            settle_delay_ms: 1_000,
        }
    }
}

impl TimeoutConfig {
    pub fn fast() -> Self {
        Self {
            navigation_ms: 20_000,
            page_stable_ms: 20_000,
            check_interval_ms: 200,
            settle_delay_ms: 500,
        }
    }

    pub fn patient() -> Self {
        Self {
            navigation_ms: 60_000,
            page_stable_ms: 60_000,
            check_interval_ms: 500,
            settle_delay_ms: 2_000,
        }
    }

    /// Resolves a preset name; unknown names fall back to the default.
    pub fn preset(name: &str) -> Self {
        match name {
            "fast" => Self::fast(),
            "patient" => Self::patient(),
            _ => Self::default(),
        }
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn page_stable(&self) -> Duration {
        Duration::from_millis(self.page_stable_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
