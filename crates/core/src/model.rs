use crate::cookie::{CookieViolation, ObservedCookie};
use crate::error::AuditError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Stages of the two-level consent interaction state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    NotStarted,
    NoticeSelection,
    NoticeInteraction,
    SecondSelection,
    PageInteraction,
    InteractionWoNotice,
    Finished,
}

impl Stage {
    /// A session in one of these stages still has work left to do.
    pub fn is_in_flight(self) -> bool {
        !matches!(self, Stage::NotStarted | Stage::Finished)
    }
}

/// Function of an interactive element inside a consent notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Accept,
    Close,
    Settings,
    Other,
    Reject,
    SaveSettings,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unmapped role label '{0}'")]
pub struct RoleDecodeError(pub String);

impl From<RoleDecodeError> for AuditError {
    fn from(e: RoleDecodeError) -> Self {
        AuditError::classifier_error(e.to_string())
            .with_context(serde_json::json!({ "raw_label": e.0 }))
    }
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Accept,
        Role::Close,
        Role::Settings,
        Role::Other,
        Role::Reject,
        Role::SaveSettings,
    ];

    pub fn index(self) -> usize {
        match self {
            Role::Accept => 0,
            Role::Close => 1,
            Role::Settings => 2,
            Role::Other => 3,
            Role::Reject => 4,
            Role::SaveSettings => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Role> {
        Role::ALL.get(index).copied()
    }

    /// Decodes a raw model label (`LABEL_<n>`) into a role.
    pub fn from_raw_label(raw: &str) -> Result<Role, RoleDecodeError> {
        raw.strip_prefix("LABEL_")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(Role::from_index)
            .ok_or_else(|| RoleDecodeError(raw.to_string()))
    }
}

/// Outward-rounded integer box in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: i64,
    pub bottom: i64,
    pub left: i64,
    pub right: i64,
}

impl BoundingBox {
    pub fn from_rect(rect: &Rect) -> Self {
        Self {
            top: rect.y.floor() as i64,
            bottom: (rect.y + rect.height).ceil() as i64,
            left: rect.x.floor() as i64,
            right: (rect.x + rect.width).ceil() as i64,
        }
    }

    pub fn center(&self) -> Point {
        Point {
            x: (self.left + self.right) as f64 / 2.0,
            y: (self.top + self.bottom) as f64 / 2.0,
        }
    }

    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.left as f64
            && point.x <= self.right as f64
            && point.y >= self.top as f64
            && point.y <= self.bottom as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// The consent banner/dialog being audited
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub locator: String,
    pub text: String,
    /// Whether the notice states an explicit purpose; `None` until classified
    pub label: Option<bool>,
    pub bounding_box: BoundingBox,
}

/// A clickable element inside a notice, addressed by one or two locator segments.
///
/// A two-segment path is only produced for elements found inside a second-level
/// panel: the first segment is the level-1 anchor that has to be clicked before
/// the second one resolves. `text` and `coordinates` are aligned with the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveElement {
    pub locator_path: Vec<String>,
    pub text: Vec<String>,
    pub tag_name: String,
    pub coordinates: Vec<Point>,
    pub role: Option<Role>,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

impl InteractiveElement {
    pub fn first_level(
        locator: impl Into<String>,
        text: impl Into<String>,
        tag_name: impl Into<String>,
        at: Point,
    ) -> Self {
        Self {
            locator_path: vec![locator.into()],
            text: vec![text.into()],
            tag_name: tag_name.into(),
            coordinates: vec![at],
            role: None,
            href: None,
            target: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_link(mut self, href: Option<String>, target: Option<String>) -> Self {
        self.href = href;
        self.target = target;
        self
    }

    /// Builds a depth-2 element from a level-1 anchor and an element exposed by clicking it.
    pub fn nested(anchor: &InteractiveElement, inner: &InteractiveElement) -> Result<Self, AuditError> {
        if anchor.depth() != 1 {
            return Err(AuditError::invalid_locator(anchor.depth() + 1));
        }
        if inner.depth() != 1 {
            return Err(AuditError::invalid_locator(inner.depth() + 1));
        }
        Ok(Self {
            locator_path: vec![anchor.locator_path[0].clone(), inner.locator_path[0].clone()],
            text: vec![anchor.label_text().to_string(), inner.label_text().to_string()],
            tag_name: inner.tag_name.clone(),
            coordinates: vec![anchor.position(), inner.position()],
            role: inner.role,
            href: inner.href.clone(),
            target: inner.target.clone(),
        })
    }

    pub fn depth(&self) -> usize {
        self.locator_path.len()
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        let depth = self.depth();
        if !(1..=2).contains(&depth) || self.text.len() != depth || self.coordinates.len() != depth {
            return Err(AuditError::invalid_locator(depth));
        }
        Ok(())
    }

    /// Text of the innermost segment.
    pub fn label_text(&self) -> &str {
        self.text.last().map(String::as_str).unwrap_or("")
    }

    pub fn last_locator(&self) -> &str {
        self.locator_path.last().map(String::as_str).unwrap_or("")
    }

    /// Position of the innermost segment.
    pub fn position(&self) -> Point {
        self.coordinates.last().copied().unwrap_or_default()
    }

    pub fn is_hyperlink(&self) -> bool {
        self.tag_name.eq_ignore_ascii_case("a") && self.href.is_some()
    }
}

/// Interactive elements grouped by role, each group in discovery order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementsByRole(BTreeMap<Role, Vec<InteractiveElement>>);

impl ElementsByRole {
    pub fn from_labeled(elements: impl IntoIterator<Item = InteractiveElement>) -> Self {
        let mut buckets = Self::default();
        for element in elements {
            buckets.push(element);
        }
        buckets
    }

    /// Elements without a role land in `Other`.
    pub fn push(&mut self, element: InteractiveElement) {
        let role = element.role.unwrap_or(Role::Other);
        self.0.entry(role).or_default().push(element);
    }

    pub fn merge(&mut self, other: ElementsByRole) {
        for (_, elements) in other.0 {
            for element in elements {
                self.push(element);
            }
        }
    }

    pub fn get(&self, role: Role) -> &[InteractiveElement] {
        self.0.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, role: Role) -> bool {
        !self.get(role).is_empty()
    }

    /// First element of `role` addressed by a single locator segment.
    pub fn first_single(&self, role: Role) -> Option<&InteractiveElement> {
        self.get(role).iter().find(|e| e.depth() == 1)
    }

    pub fn all(&self) -> impl Iterator<Item = &InteractiveElement> {
        self.0.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Progress of the page-interaction stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub current_element: Option<InteractiveElement>,
    pub visited_pages: BTreeSet<String>,
    /// Number of planned elements already executed
    #[serde(default)]
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForcedActionStatus {
    #[default]
    NotChecked,
    Passed,
    Violated { unreachable: Vec<String> },
    Skipped { reason: String },
}

/// Perceptual distance between the accept control and its reject-side counterpart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorDistance {
    pub accept_locator: String,
    pub counterpart_locator: String,
    pub counterpart_role: Role,
    pub accept_color: [u8; 3],
    pub counterpart_color: [u8; 3],
    pub distance: f64,
    pub violation: bool,
}

/// Cookies observed after executing one planned element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchOutcome {
    pub role: Role,
    pub element: InteractiveElement,
    pub succeeded: bool,
    pub cookies: Vec<ObservedCookie>,
    #[serde(default)]
    pub visited_pages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieBuckets {
    /// Cookies present while the notice is shown and untouched
    pub baseline: Vec<ObservedCookie>,
    /// Cookies observed on the no-notice path
    pub no_notice: Vec<ObservedCookie>,
    pub branches: Vec<BranchOutcome>,
}

/// The orchestrator's checkpointed state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub session_id: u64,
    pub stage: Stage,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub notice_detected: bool,
    pub purpose_declared: Option<bool>,
    pub reject_detected: bool,
    pub close_save_detected: bool,
    pub interactive_elements: ElementsByRole,
    #[serde(default)]
    pub second_level: ElementsByRole,
    pub ie_to_interact: Vec<InteractiveElement>,
    pub cookies: CookieBuckets,
    pub forced_action_status: ForcedActionStatus,
    pub color_distances: Vec<ColorDistance>,
    #[serde(default)]
    pub cookie_violations: Vec<CookieViolation>,
}

impl ScanSession {
    pub fn new(session_id: u64, url: impl Into<String>, stage: Stage) -> Self {
        Self {
            session_id,
            stage,
            url: url.into(),
            started_at: Utc::now(),
            notice_detected: false,
            purpose_declared: None,
            reject_detected: false,
            close_save_detected: false,
            interactive_elements: ElementsByRole::default(),
            second_level: ElementsByRole::default(),
            ie_to_interact: Vec::new(),
            cookies: CookieBuckets::default(),
            forced_action_status: ForcedActionStatus::NotChecked,
            color_distances: Vec::new(),
            cookie_violations: Vec::new(),
        }
    }

    pub fn reset(session_id: u64) -> Self {
        Self::new(session_id, "", Stage::NotStarted)
    }
}

/// Document handed to the report renderer once a scan finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub report_id: String,
    pub url: String,
    pub finished_at: DateTime<Utc>,
    pub session: ScanSession,
}

impl ScanReport {
    pub fn from_session(session: ScanSession) -> Self {
        Self {
            report_id: format!("scan-{}-{}", session.session_id, session.started_at.timestamp()),
            url: session.url.clone(),
            finished_at: Utc::now(),
            session,
        }
    }

    pub fn has_violations(&self) -> bool {
        !self.session.cookie_violations.is_empty()
            || matches!(self.session.forced_action_status, ForcedActionStatus::Violated { .. })
            || self.session.color_distances.iter().any(|c| c.violation)
    }
}
