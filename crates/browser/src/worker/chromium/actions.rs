use chromiumoxide::cdp::browser_protocol::network::{ClearBrowserCookiesParams, Cookie, CookieSameSite};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams, Viewport};
use chromiumoxide::page::Page;
use consentry_core::{AuditError, BrowserCookie, Rect, SameSite};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::sleep;
use crate::shared::{is_context_loss, js, to_audit_error, TimeoutConfig};

/// Thin wrappers over page evaluation and CDP calls
pub struct ActionHandler {
    config: TimeoutConfig,
}

impl ActionHandler {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    /// Calls a snippet and deserializes its return value; `undefined` reads as `null`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        page: &Page,
        func: &str,
        args: &[Value],
        action: &str,
    ) -> Result<T, AuditError> {
        let js = js::build_js_call(func, args);
        let mut retried = false;
        let result = loop {
            match page.evaluate(js.clone()).await {
                Ok(r) => break r,
                // one retry after the document was swapped under us
                Err(e) if is_context_loss(&e) && !retried => {
                    retried = true;
                    sleep(self.config.check_interval()).await;
                }
                Err(e) => return Err(to_audit_error(e, action)),
            }
        };
        let value = result.value().cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| AuditError::script_error(format!("{} returned unexpected data: {}", action, e)))
    }

    pub async fn cookies(&self, page: &Page) -> Result<Vec<BrowserCookie>, AuditError> {
        let cookies = page.get_cookies().await
            .map_err(|e| to_audit_error(e, "GetCookies"))?;
        Ok(cookies.iter().map(to_browser_cookie).collect())
    }

    pub async fn clear_cookies(&self, page: &Page) -> Result<(), AuditError> {
        page.execute(ClearBrowserCookiesParams::default()).await
            .map_err(|e| to_audit_error(e, "ClearCookies"))?;
        Ok(())
    }

    pub async fn capture(&self, page: &Page, locator: &str) -> Result<Option<Vec<u8>>, AuditError> {
        let rect: Option<Rect> = self
            .call(page, js::element::CAPTURE_RECT, &[json!(locator)], "Capture")
            .await?;
        let Some(rect) = rect else {
            return Ok(None);
        };
        // let a smooth scroll settle before rasterising
        sleep(self.config.check_interval()).await;

        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(Viewport {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                scale: 1.0,
            })
            .capture_beyond_viewport(true)
            .build();
        let bytes = page.screenshot(params).await
            .map_err(|e| AuditError::browser_error(format!("Screenshot failed: {}", e)))?;
        Ok(Some(bytes))
    }
}

fn to_browser_cookie(cookie: &Cookie) -> BrowserCookie {
    BrowserCookie {
        name: cookie.name.clone(),
        value: cookie.value.clone(),
        domain: cookie.domain.clone(),
        path: cookie.path.clone(),
        expires: if cookie.session || cookie.expires <= 0.0 { None } else { Some(cookie.expires) },
        http_only: cookie.http_only,
        secure: cookie.secure,
        session: cookie.session,
        same_site: match cookie.same_site {
            Some(CookieSameSite::Strict) => SameSite::Strict,
            Some(CookieSameSite::Lax) => SameSite::Lax,
            Some(CookieSameSite::None) => SameSite::None,
            None => SameSite::Unspecified,
        },
    }
}
