use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig, HeadlessMode};
use chromiumoxide::page::Page;
use consentry_core::{
    AuditError, BoundingBox, BrowserCookie, Dimensions, ElementState, FrameStatus, NodeInfo,
    OverlayCandidate, PageDriver, Rect,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::actions::ActionHandler;
use super::wait::WaitStrategy;
use crate::shared::{js, TimeoutConfig};
use crate::worker::BrowserSettings;

/// One Chromium tab driven over CDP
pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    actions: ActionHandler,
    wait_strategy: WaitStrategy,
    timeout_config: TimeoutConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawState {
    visible: bool,
    covered: bool,
    rect: Rect,
    tag_name: String,
    href: Option<String>,
    target: Option<String>,
}

#[derive(Deserialize)]
struct RawFootprint {
    texts: Vec<String>,
    width: u32,
    height: u32,
}

impl ChromiumPage {
    pub async fn launch(settings: &BrowserSettings, timeout_config: TimeoutConfig) -> Result<Self, AuditError> {
        let temp_dir = std::env::temp_dir().join(format!("consentry-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&temp_dir)
            .map_err(|e| AuditError::browser_error(format!("Failed to create temp dir: {}", e)))?;

        let mut builder = ChromeConfig::builder()
            .headless_mode(if settings.headless { HeadlessMode::True } else { HeadlessMode::False })
            .user_data_dir(temp_dir)
            .window_size(settings.viewport_width, settings.viewport_height);

        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let chrome_cfg = builder.build()
            .map_err(|e| AuditError::browser_error(format!("Config failed: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_cfg).await
            .map_err(|e| AuditError::browser_error(format!("Launch failed: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler error (ignoring)");
                }
            }
        });

        let page = browser.new_page("about:blank").await
            .map_err(|e| AuditError::browser_error(format!("New page failed: {}", e)))?;

        info!(headless = settings.headless, "browser launched");
        Ok(Self {
            browser,
            page,
            handler_task,
            actions: ActionHandler::new(timeout_config),
            wait_strategy: WaitStrategy::new(timeout_config),
            timeout_config,
        })
    }

    pub async fn close(mut self) -> Result<(), AuditError> {
        self.browser.close().await
            .map_err(|e| AuditError::browser_error(format!("Close failed: {}", e)))?;
        self.handler_task.abort();
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn current_url(&self) -> Result<String, AuditError> {
        let url = self.page.url().await
            .map_err(|e| AuditError::navigation_error(format!("Reading URL failed: {}", e)))?;
        Ok(url.unwrap_or_default())
    }

    async fn navigate(&self, url: &str) -> Result<(), AuditError> {
        debug!(url, "navigating");
        match tokio::time::timeout(self.timeout_config.navigation(), self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(AuditError::navigation_error(format!("Navigation failed: {}", e))
                    .with_context(json!({ "url": url })));
            }
            Err(_) => warn!(url, "navigation timed out, waiting for the page anyway"),
        }
        self.wait_strategy.wait_for_stable(&self.page).await
    }

    async fn clear_cookies(&self) -> Result<(), AuditError> {
        self.actions.clear_cookies(&self.page).await
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>, AuditError> {
        self.actions.cookies(&self.page).await
    }

    async fn element_state(&self, locator: &str) -> Result<Option<ElementState>, AuditError> {
        let raw: Option<serde_json::Value> = self
            .actions
            .call(&self.page, js::element::ELEMENT_STATE, &[json!(locator)], "ElementState")
            .await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let canonical = raw.get("locator").and_then(|v| v.as_str()).unwrap_or(locator).to_string();
        let raw: RawState = serde_json::from_value(raw)?;
        Ok(Some(ElementState {
            locator: canonical,
            visible: raw.visible,
            covered: raw.covered,
            bounding_box: BoundingBox::from_rect(&raw.rect),
            tag_name: raw.tag_name,
            href: raw.href,
            target: raw.target,
        }))
    }

    async fn descendants(&self, root: &str) -> Result<Vec<NodeInfo>, AuditError> {
        let nodes: Option<Vec<NodeInfo>> = self
            .actions
            .call(&self.page, js::element::DESCENDANTS, &[json!(root)], "Descendants")
            .await?;
        nodes.ok_or_else(|| AuditError::element_not_found(root))
    }

    async fn footprint_data(&self, root: &str) -> Result<Option<(Vec<String>, Dimensions)>, AuditError> {
        let raw: Option<RawFootprint> = self
            .actions
            .call(&self.page, js::element::FOOTPRINT, &[json!(root)], "Footprint")
            .await?;
        Ok(raw.map(|r| (r.texts, Dimensions { width: r.width, height: r.height })))
    }

    async fn click(&self, locator: &str) -> Result<Vec<FrameStatus>, AuditError> {
        self.actions
            .call(&self.page, js::element::CLICK, &[json!(locator)], "Click")
            .await
    }

    async fn mutation_count(&self) -> Result<u64, AuditError> {
        self.actions
            .call(&self.page, js::wait::MUTATION_COUNT, &[], "MutationCount")
            .await
    }

    async fn capture(&self, locator: &str) -> Result<Option<Vec<u8>>, AuditError> {
        self.actions.capture(&self.page, locator).await
    }

    async fn viewport(&self) -> Result<Dimensions, AuditError> {
        self.actions
            .call(&self.page, js::element::VIEWPORT, &[], "Viewport")
            .await
    }

    async fn overlay_candidates(&self) -> Result<Vec<OverlayCandidate>, AuditError> {
        self.actions
            .call(&self.page, js::cookie::OVERLAY_CANDIDATES, &[], "OverlayCandidates")
            .await
    }
}
