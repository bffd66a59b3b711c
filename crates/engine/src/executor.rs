use crate::quiescence::Quiescence;
use consentry_core::{AuditError, ErrorCategory, FrameStatus, PageDriver};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Success,
    WrongSelector,
    Failed,
}

impl ClickOutcome {
    pub fn is_success(self) -> bool {
        self == ClickOutcome::Success
    }
}

/// Success needs at least one SUCCESS frame and no WRONG_SELECTOR frame.
pub fn evaluate_statuses(statuses: &[FrameStatus]) -> ClickOutcome {
    let wrong = statuses.contains(&FrameStatus::WrongSelector);
    if wrong {
        ClickOutcome::WrongSelector
    } else if statuses.contains(&FrameStatus::Success) {
        ClickOutcome::Success
    } else {
        ClickOutcome::Failed
    }
}

pub struct Executor {
    quiescence: Quiescence,
}

impl Executor {
    pub fn new(quiescence: Quiescence) -> Self {
        Self { quiescence }
    }

    pub fn quiescence(&self) -> &Quiescence {
        &self.quiescence
    }

    /// Clicks a one- or two-segment path. For two segments the anchor is clicked
    /// first and the page has to settle before the inner segment is clicked.
    /// No retries happen here.
    pub async fn click_and_wait(&self, page: &dyn PageDriver, path: &[String]) -> Result<ClickOutcome, AuditError> {
        match path {
            [single] => self.click_segment(page, single).await,
            [anchor, inner] => {
                let first = self.click_segment(page, anchor).await?;
                if !first.is_success() {
                    return Ok(first);
                }
                self.click_segment(page, inner).await
            }
            _ => Err(AuditError::invalid_locator(path.len())),
        }
    }

    async fn click_segment(&self, page: &dyn PageDriver, locator: &str) -> Result<ClickOutcome, AuditError> {
        let outcome = match page.click(locator).await {
            Ok(statuses) => evaluate_statuses(&statuses),
            Err(e) if e.category == ErrorCategory::ElementNotFound => ClickOutcome::WrongSelector,
            Err(e) => return Err(e),
        };
        debug!(locator, ?outcome, "click dispatched");
        if outcome.is_success() {
            self.quiescence.wait(page).await?;
        }
        Ok(outcome)
    }
}
