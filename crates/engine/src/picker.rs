use async_trait::async_trait;
use consentry_core::{AuditError, NoticePicker, OverlayCandidate, PageDriver, PickReason};
use tracing::{debug, warn};

/// Words that mark a layer as a consent notice
pub const CONSENT_KEYWORDS: &[&str] = &[
    "cookie", "consent", "privacy", "gdpr", "tracking", "personal data", "your data", "partners",
    "datenschutz", "einwilligung", "confidentialité", "consentement", "privacidad", "cookies",
];

pub fn keyword_hits(text: &str) -> usize {
    let lower = text.to_lowercase();
    CONSENT_KEYWORDS.iter().filter(|k| lower.contains(*k)).count()
}

/// Picks the most consent-like fixed/sticky layer.
#[derive(Debug, Default, Clone)]
pub struct HeuristicNoticePicker;

impl HeuristicNoticePicker {
    /// Initial picks prefer keyword density; new layers prefer the topmost stacking order.
    pub fn choose(candidates: &[OverlayCandidate], reason: PickReason) -> Option<&OverlayCandidate> {
        let scored = candidates
            .iter()
            .map(|c| (keyword_hits(&c.text), c))
            .filter(|(hits, _)| *hits > 0);

        match reason {
            PickReason::Initial => scored
                .max_by(|(ha, a), (hb, b)| {
                    ha.cmp(hb)
                        .then(a.z_index.cmp(&b.z_index))
                        // the tighter box wins among equals
                        .then(b.rect.area().total_cmp(&a.rect.area()))
                })
                .map(|(_, c)| c),
            PickReason::NewLayer => scored
                .max_by(|(ha, a), (hb, b)| a.z_index.cmp(&b.z_index).then(ha.cmp(hb)))
                .map(|(_, c)| c),
        }
    }
}

#[async_trait]
impl NoticePicker for HeuristicNoticePicker {
    async fn pick(&self, page: &dyn PageDriver, reason: PickReason) -> Result<Option<String>, AuditError> {
        let candidates = page.overlay_candidates().await?;
        let chosen = Self::choose(&candidates, reason).map(|c| c.locator.clone());
        debug!(?reason, candidates = candidates.len(), ?chosen, "heuristic notice pick");
        Ok(chosen)
    }
}

/// Uses an operator-supplied locator for the initial notice and the heuristic for new layers.
#[derive(Debug, Clone)]
pub struct FixedNoticePicker {
    locator: String,
    fallback: HeuristicNoticePicker,
}

impl FixedNoticePicker {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            fallback: HeuristicNoticePicker,
        }
    }
}

#[async_trait]
impl NoticePicker for FixedNoticePicker {
    async fn pick(&self, page: &dyn PageDriver, reason: PickReason) -> Result<Option<String>, AuditError> {
        match reason {
            PickReason::Initial => match page.element_state(&self.locator).await? {
                Some(state) if state.visible => Ok(Some(self.locator.clone())),
                _ => {
                    warn!(locator = %self.locator, "configured notice not visible");
                    Ok(None)
                }
            },
            PickReason::NewLayer => self.fallback.pick(page, reason).await,
        }
    }
}
