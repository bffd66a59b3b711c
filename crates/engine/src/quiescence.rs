use crate::config::ScanConfig;
use consentry_core::{AuditError, PageDriver};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Bounded wait for the DOM to stop mutating.
#[derive(Debug, Clone)]
pub struct Quiescence {
    pub quiet: Duration,
    pub timeout: Duration,
    pub poll: Duration,
}

impl Quiescence {
    pub fn new(quiet: Duration, timeout: Duration, poll: Duration) -> Self {
        Self { quiet, timeout, poll }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.quiet_interval(), config.quiescence_timeout(), config.poll_interval())
    }

    /// Returns `true` once no mutation was seen for `quiet`, `false` when `timeout` ran out first.
    pub async fn wait(&self, page: &dyn PageDriver) -> Result<bool, AuditError> {
        let start = Instant::now();
        let mut last_count = page.mutation_count().await?;
        let mut last_change = Instant::now();

        loop {
            if last_change.elapsed() >= self.quiet {
                debug!(elapsed_ms = start.elapsed().as_millis() as u64, "dom quiescent");
                return Ok(true);
            }
            if start.elapsed() >= self.timeout {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "dom still mutating, continuing");
                return Ok(false);
            }

            sleep(self.poll).await;

            let count = page.mutation_count().await?;
            if count != last_count {
                last_count = count;
                last_change = Instant::now();
            }
        }
    }
}
