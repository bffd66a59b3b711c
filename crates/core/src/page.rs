use crate::cookie::BrowserCookie;
use crate::error::AuditError;
use crate::model::{BoundingBox, Dimensions, Rect};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Locator of the whole document, used as a discovery root.
pub const DOCUMENT_ROOT: &str = "html";

/// Per-frame result of dispatching a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameStatus {
    Success,
    WrongSelector,
    /// The frame does not host the locator's root
    NotApplicable,
}

/// Live state of a resolved element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    /// Canonical structural locator of the resolved element
    pub locator: String,
    pub visible: bool,
    /// The topmost element at the box center is not contained by this element
    pub covered: bool,
    pub bounding_box: BoundingBox,
    pub tag_name: String,
    pub href: Option<String>,
    pub target: Option<String>,
}

/// Raw descendant node reported by the page, before any eligibility filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub locator: String,
    pub tag_name: String,
    pub text: String,
    pub rect: Rect,
    pub visible: bool,
    #[serde(default)]
    pub has_role: bool,
    #[serde(default)]
    pub has_click_handler: bool,
    #[serde(default)]
    pub pointer_cursor: bool,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// Fixed or sticky layer that may host a consent notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayCandidate {
    pub locator: String,
    pub text: String,
    pub rect: Rect,
    pub z_index: i64,
    pub position: String,
}

/// DOM adapter over one browser tab
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn current_url(&self) -> Result<String, AuditError>;

    /// Navigate and wait for the document to finish loading.
    async fn navigate(&self, url: &str) -> Result<(), AuditError>;

    async fn clear_cookies(&self) -> Result<(), AuditError>;

    async fn cookies(&self) -> Result<Vec<BrowserCookie>, AuditError>;

    /// `None` when the locator resolves to nothing.
    async fn element_state(&self, locator: &str) -> Result<Option<ElementState>, AuditError>;

    /// All element descendants of `root`, in document order, including open shadow roots.
    async fn descendants(&self, root: &str) -> Result<Vec<NodeInfo>, AuditError>;

    /// Visible text fragments and client dimensions of `root`.
    async fn footprint_data(&self, root: &str) -> Result<Option<(Vec<String>, Dimensions)>, AuditError>;

    async fn click(&self, locator: &str) -> Result<Vec<FrameStatus>, AuditError>;

    /// Monotonic count of DOM mutations observed since the document loaded.
    async fn mutation_count(&self) -> Result<u64, AuditError>;

    /// PNG rendering of the element, `None` when it cannot be resolved.
    async fn capture(&self, locator: &str) -> Result<Option<Vec<u8>>, AuditError>;

    async fn viewport(&self) -> Result<Dimensions, AuditError>;

    async fn overlay_candidates(&self) -> Result<Vec<OverlayCandidate>, AuditError>;
}
