use chromiumoxide::page::Page;
use consentry_core::AuditError;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, warn};
use crate::shared::{is_context_loss, js, to_audit_error, TimeoutConfig};

pub struct WaitStrategy {
    config: TimeoutConfig,
}

impl WaitStrategy {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    /// Waits until the document is complete with no resource requests in flight.
    /// Never fails on timeout, the audit continues on whatever has loaded.
    pub async fn wait_for_stable(&self, page: &Page) -> Result<(), AuditError> {
        let timeout = self.config.page_stable();
        let start = Instant::now();
        let mut stable_checks = 0;
        let required_stable_checks = 5;

        debug!("waiting for page to stabilize");

        loop {
            let js = js::build_js_call(js::wait::CHECK_LOADING, &[]);

            let result = match page.evaluate(js).await {
                Ok(r) => r,
                Err(e) => {
                    if is_context_loss(&e) {
                        debug!("page context changed (navigating), waiting");
                        stable_checks = 0;
                        sleep(self.config.check_interval() * 3).await;
                        continue;
                    }
                    return Err(to_audit_error(e, "WaitForStable"));
                }
            };

            if let Some(obj) = result.value().and_then(|v| v.as_object()) {
                let ready = obj.get("readyState").and_then(|v| v.as_str()) == Some("complete");
                let active = obj.get("activeRequests").and_then(|v| v.as_u64()).unwrap_or(0);

                if ready && active == 0 {
                    stable_checks += 1;
                    if stable_checks >= required_stable_checks {
                        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "page stabilized");
                        sleep(self.config.settle_delay()).await;
                        return Ok(());
                    }
                } else {
                    if stable_checks > 0 {
                        debug!(ready, active, "page activity detected, resetting");
                    }
                    stable_checks = 0;
                }
            }

            if start.elapsed() > timeout {
                warn!("page stabilization timeout, continuing anyway");
                return Ok(());
            }

            sleep(self.config.check_interval()).await;
        }
    }
}
