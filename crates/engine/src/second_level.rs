use crate::discovery::Discovery;
use crate::executor::Executor;
use crate::footprint::{Footprint, footprint_of};
use consentry_classifier::ClassifierAdapter;
use consentry_core::{
    AuditError, ElementsByRole, InteractiveElement, Notice, NoticePicker, PageDriver, PickReason, Role,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

/// What a probe click did to the notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeOutcome {
    /// Hyperlink leaving the page; never clicked
    ExternalAnchor,
    /// A new layer opened above the notice, or the notice went away
    NewNotice,
    /// The notice updated in place
    SameNotice,
}

/// Second-level probing is only worth it when the first level offers no direct
/// refusal but has something that may open one. Close and SaveSettings do not
/// count as a refusal: dismissing or saving defaults still leaves the panel unexplored.
pub fn needs_second_level(first: &ElementsByRole) -> bool {
    !first.has(Role::Reject) && (first.has(Role::Settings) || first.has(Role::Other))
}

/// Every Settings element when there is one; otherwise non-hyperlink Other
/// elements, bottom-left first, capped at `cap`.
pub fn probe_candidates(first: &ElementsByRole, cap: usize) -> Vec<InteractiveElement> {
    let settings: Vec<InteractiveElement> = first
        .get(Role::Settings)
        .iter()
        .filter(|e| e.depth() == 1)
        .cloned()
        .collect();
    if !settings.is_empty() {
        return settings;
    }

    let mut others: Vec<InteractiveElement> = first
        .get(Role::Other)
        .iter()
        .filter(|e| e.depth() == 1 && !e.is_hyperlink())
        .cloned()
        .collect();
    sort_bottom_left(&mut others);
    others.truncate(cap);
    others
}

/// Vertical position descending, then horizontal position ascending.
pub fn sort_bottom_left(elements: &mut [InteractiveElement]) {
    elements.sort_by(|a, b| {
        let (pa, pb) = (a.position(), b.position());
        pb.y.partial_cmp(&pa.y)
            .unwrap_or(Ordering::Equal)
            .then(pa.x.partial_cmp(&pb.x).unwrap_or(Ordering::Equal))
    });
}

/// A hyperlink that opens another browsing context or leaves the current document.
pub fn is_external_anchor(element: &InteractiveElement, page_url: &Url) -> bool {
    if !element.tag_name.eq_ignore_ascii_case("a") {
        return false;
    }
    if let Some(target) = element.target.as_deref() {
        let target = target.trim();
        if !target.is_empty() && !target.eq_ignore_ascii_case("_self") {
            return true;
        }
    }
    let Some(href) = element.href.as_deref().map(str::trim) else {
        return false;
    };
    if href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:") {
        return false;
    }
    match page_url.join(href) {
        Ok(dest) => dest.origin() != page_url.origin() || dest.path() != page_url.path(),
        Err(_) => false,
    }
}

/// Classifies the notice after a successful probe click against its pre-click footprint.
pub async fn classify_after_click(
    page: &dyn PageDriver,
    notice: &Notice,
    before: &Footprint,
) -> Result<ProbeOutcome, AuditError> {
    let state = page.element_state(&notice.locator).await?;
    match state {
        Some(s) if s.visible && !s.covered => match footprint_of(page, &notice.locator).await? {
            Some(after) if !after.equivalent(before) => Ok(ProbeOutcome::SameNotice),
            _ => Ok(ProbeOutcome::NewNotice),
        },
        _ => Ok(ProbeOutcome::NewNotice),
    }
}

/// Elements of `after` not present, by locator and text, in `before`.
pub fn newly_exposed(before: &[InteractiveElement], after: Vec<InteractiveElement>) -> Vec<InteractiveElement> {
    let seen: HashSet<(&str, &str)> = before.iter().map(|e| (e.last_locator(), e.label_text())).collect();
    after
        .into_iter()
        .filter(|e| !seen.contains(&(e.last_locator(), e.label_text())))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub candidate: InteractiveElement,
    /// `None` when the probe click itself failed
    pub outcome: Option<ProbeOutcome>,
    /// Depth-2 elements, anchored on the candidate
    pub found: Vec<InteractiveElement>,
}

impl ProbeReport {
    fn empty(candidate: &InteractiveElement, outcome: Option<ProbeOutcome>) -> Self {
        Self {
            candidate: candidate.clone(),
            outcome,
            found: Vec::new(),
        }
    }
}

pub struct SecondLevelProbe<'a> {
    pub page: &'a dyn PageDriver,
    pub discovery: &'a Discovery,
    pub executor: &'a Executor,
    pub classifier: &'a ClassifierAdapter,
    pub picker: &'a dyn NoticePicker,
}

impl SecondLevelProbe<'_> {
    /// Clicks one candidate and collects what it exposes. The caller resets the
    /// page before the next candidate.
    pub async fn probe(
        &self,
        page_url: &Url,
        notice: &Notice,
        first_level: &[InteractiveElement],
        candidate: &InteractiveElement,
    ) -> Result<ProbeReport, AuditError> {
        if is_external_anchor(candidate, page_url) {
            info!(locator = candidate.last_locator(), "skipping external anchor");
            return Ok(ProbeReport::empty(candidate, Some(ProbeOutcome::ExternalAnchor)));
        }

        let before = footprint_of(self.page, &notice.locator)
            .await?
            .ok_or_else(|| AuditError::element_not_found(&notice.locator))?;

        let clicked = self.executor.click_and_wait(self.page, &candidate.locator_path).await?;
        if !clicked.is_success() {
            warn!(locator = candidate.last_locator(), outcome = ?clicked, "probe click failed");
            return Ok(ProbeReport::empty(candidate, None));
        }

        let outcome = classify_after_click(self.page, notice, &before).await?;
        debug!(locator = candidate.last_locator(), ?outcome, "probe classified");

        let exposed = match outcome {
            ProbeOutcome::SameNotice => {
                let current = self.discovery.elements(self.page, &notice.locator).await?;
                newly_exposed(first_level, current)
            }
            ProbeOutcome::NewNotice => match self.picker.pick(self.page, PickReason::NewLayer).await? {
                Some(layer) => self.discovery.elements(self.page, &layer).await?,
                None => {
                    info!(locator = candidate.last_locator(), "no new layer marked after probe");
                    Vec::new()
                }
            },
            ProbeOutcome::ExternalAnchor => Vec::new(),
        };

        let labeled = self.classifier.label_elements(exposed).await?;
        let found = labeled
            .iter()
            .map(|inner| InteractiveElement::nested(candidate, inner))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProbeReport {
            candidate: candidate.clone(),
            outcome: Some(outcome),
            found,
        })
    }
}
