use crate::config::ScanConfig;
use crate::dark_patterns::{forced_action, interface_interference};
use crate::differential;
use crate::discovery::Discovery;
use crate::executor::{ClickOutcome, Executor};
use crate::planner::InteractionPlan;
use crate::quiescence::Quiescence;
use crate::second_level::{SecondLevelProbe, probe_candidates};
use crate::session::SessionContext;
use crate::tracker::CookieTracker;
use consentry_classifier::ClassifierAdapter;
use consentry_core::{
    AuditError, BranchOutcome, CookieClassifier, DOCUMENT_ROOT, ElementsByRole, ForcedActionStatus, Interaction,
    InteractiveElement, NodeInfo, Notice, NoticePicker, Notifier, PageDriver, PickReason, Role, ScanReport, Stage,
};
use consentry_storage::{KeyValueStore, ReportStorage, keys};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Everything the orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub page: Arc<dyn PageDriver>,
    pub store: Arc<dyn KeyValueStore>,
    pub reports: Arc<dyn ReportStorage>,
    pub classifier: Arc<ClassifierAdapter>,
    pub cookie_classifier: Arc<dyn CookieClassifier>,
    pub picker: Arc<dyn NoticePicker>,
    pub notifier: Arc<dyn Notifier>,
}

/// Drives one scan through its stages, checkpointing after each one.
pub struct Orchestrator {
    page: Arc<dyn PageDriver>,
    store: Arc<dyn KeyValueStore>,
    reports: Arc<dyn ReportStorage>,
    classifier: Arc<ClassifierAdapter>,
    picker: Arc<dyn NoticePicker>,
    discovery: Discovery,
    executor: Executor,
    tracker: CookieTracker,
    config: ScanConfig,
}

fn parse_url(url: &str) -> Result<Url, AuditError> {
    Url::parse(url).map_err(|e| AuditError::navigation_error(format!("Invalid scan url '{}': {}", url, e)))
}

/// Same-origin links not visited yet, in document order.
pub fn exploration_targets(nodes: &[NodeInfo], current: &Url, visited: &BTreeSet<String>, limit: usize) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    for node in nodes {
        if targets.len() >= limit {
            break;
        }
        if !node.tag_name.eq_ignore_ascii_case("a") {
            continue;
        }
        let Some(href) = node.href.as_deref() else {
            continue;
        };
        let Ok(mut dest) = current.join(href) else {
            continue;
        };
        dest.set_fragment(None);
        if dest.origin() != current.origin() || !matches!(dest.scheme(), "http" | "https") {
            continue;
        }
        let dest = dest.to_string();
        if dest == current.as_str() || visited.contains(&dest) || targets.contains(&dest) {
            continue;
        }
        targets.push(dest);
    }
    targets
}

/// The rediscovered element matching `element` by tag and text, keeping its role.
/// Depth-2 paths only re-resolve the anchor segment.
pub fn relocate(candidates: &[InteractiveElement], element: &InteractiveElement) -> Result<Option<InteractiveElement>, AuditError> {
    match element.depth() {
        1 => Ok(candidates
            .iter()
            .find(|c| c.tag_name.eq_ignore_ascii_case(&element.tag_name) && c.label_text() == element.label_text())
            .map(|c| {
                let mut relocated = c.clone();
                relocated.role = element.role;
                relocated
            })),
        2 => Ok(candidates
            .iter()
            .find(|c| c.label_text() == element.text[0])
            .map(|anchor| {
                let mut relocated = element.clone();
                relocated.locator_path[0] = anchor.locator_path[0].clone();
                relocated.coordinates[0] = anchor.position();
                relocated
            })),
        depth => Err(AuditError::invalid_locator(depth)),
    }
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, config: ScanConfig) -> Self {
        let Collaborators {
            page,
            store,
            reports,
            classifier,
            cookie_classifier,
            picker,
            notifier,
        } = collaborators;
        Self {
            discovery: Discovery::new(config.discovery_budget(), notifier),
            executor: Executor::new(Quiescence::from_config(&config)),
            tracker: CookieTracker::new(cookie_classifier, &config),
            page,
            store,
            reports,
            classifier,
            picker,
            config,
        }
    }

    /// Full scan of a site expected to show a consent notice.
    pub async fn start(&self, url: &str) -> Result<ScanReport, AuditError> {
        parse_url(url)?;
        let ctx = SessionContext::begin(self.store.clone(), url, Stage::NoticeSelection).await?;
        self.reset_page(url).await?;
        self.run(ctx).await
    }

    /// Scan of a site the operator says shows no notice.
    pub async fn declare_no_notice(&self, url: &str) -> Result<ScanReport, AuditError> {
        parse_url(url)?;
        let ctx = SessionContext::begin(self.store.clone(), url, Stage::InteractionWoNotice).await?;
        self.run(ctx).await
    }

    /// Continues the active session from its last committed stage.
    pub async fn resume(&self) -> Result<Option<ScanReport>, AuditError> {
        let Some(ctx) = SessionContext::attach(self.store.clone()).await? else {
            debug!("no active session to resume");
            return Ok(None);
        };
        info!(session_id = ctx.id(), stage = ?ctx.session().stage, "resuming session");
        // the page may have navigated anywhere since the last checkpoint
        if ctx.session().stage != Stage::Finished {
            self.reset_page(&ctx.session().url).await?;
        }
        self.run(ctx).await.map(Some)
    }

    pub async fn cancel(&self) -> Result<Option<u64>, AuditError> {
        SessionContext::cancel(&*self.store).await
    }

    async fn run(&self, mut ctx: SessionContext) -> Result<ScanReport, AuditError> {
        loop {
            let stage = ctx.session().stage;
            debug!(session_id = ctx.id(), ?stage, "running stage");
            let step = match stage {
                Stage::NoticeSelection => self.select_notice(&mut ctx).await,
                Stage::NoticeInteraction => self.classify_notice(&mut ctx).await,
                Stage::SecondSelection => self.discover_second_level(&mut ctx).await,
                Stage::PageInteraction => self.interact(&mut ctx).await,
                Stage::InteractionWoNotice => self.interact_without_notice(&mut ctx).await,
                Stage::Finished => return self.finish(ctx).await,
                Stage::NotStarted => return Err(AuditError::stale_session(ctx.id(), None)),
            };
            if let Err(e) = step {
                if e.is_stale() {
                    info!(session_id = ctx.id(), ?stage, "session went stale, dropping step result");
                } else {
                    error!(session_id = ctx.id(), ?stage, error = %e, "stage failed");
                }
                return Err(e);
            }
        }
    }

    async fn reset_page(&self, url: &str) -> Result<(), AuditError> {
        self.page.clear_cookies().await?;
        self.page.navigate(url).await?;
        self.executor.quiescence().wait(&*self.page).await?;
        Ok(())
    }

    async fn select_notice(&self, ctx: &mut SessionContext) -> Result<(), AuditError> {
        let Some(locator) = self.picker.pick(&*self.page, PickReason::Initial).await? else {
            info!(session_id = ctx.id(), "no notice marked, switching to no-notice path");
            ctx.session_mut().notice_detected = false;
            return ctx.advance(Stage::InteractionWoNotice).await;
        };

        let notice = self.discovery.notice(&*self.page, &locator).await?;
        info!(session_id = ctx.id(), locator = %notice.locator, "notice selected");
        ctx.put(keys::NOTICE, &notice).await?;

        let baseline = self.tracker.capture(ctx, &*self.page, false).await?;
        let session = ctx.session_mut();
        session.notice_detected = true;
        session.cookies.baseline = baseline;
        ctx.advance(Stage::NoticeInteraction).await
    }

    async fn classify_notice(&self, ctx: &mut SessionContext) -> Result<(), AuditError> {
        let mut notice: Notice = ctx.artifact(keys::NOTICE).await?;

        let translated = self.classifier.translate_all(std::slice::from_ref(&notice.text)).await?;
        let purpose = self
            .classifier
            .purpose_declared(translated.first().map(String::as_str).unwrap_or(""))
            .await?;
        notice.label = Some(purpose);
        ctx.put(keys::NOTICE, &notice).await?;

        let found = self.discovery.elements(&*self.page, &notice.locator).await?;
        let labeled = self.classifier.label_elements(found).await?;
        for element in &labeled {
            element.validate()?;
        }
        ctx.put(keys::ELEMENTS, &labeled).await?;

        let plan = InteractionPlan::new(ElementsByRole::from_labeled(labeled));
        info!(
            session_id = ctx.id(),
            purpose,
            elements = plan.first_level.len(),
            second_level = plan.needs_second_level(),
            "notice classified"
        );

        let next = if plan.needs_second_level() {
            Stage::SecondSelection
        } else {
            Stage::PageInteraction
        };
        let session = ctx.session_mut();
        session.purpose_declared = Some(purpose);
        session.reject_detected = plan.reject_detected();
        session.close_save_detected = plan.close_save_detected();
        session.ie_to_interact = plan.elements();
        session.interactive_elements = plan.first_level;
        ctx.advance(next).await
    }

    async fn discover_second_level(&self, ctx: &mut SessionContext) -> Result<(), AuditError> {
        let url = ctx.session().url.clone();
        let page_url = parse_url(&url)?;
        let notice: Notice = ctx.artifact(keys::NOTICE).await?;
        let first = ctx.session().interactive_elements.clone();
        let first_level: Vec<InteractiveElement> = first.all().cloned().collect();

        let candidates = probe_candidates(&first, self.config.max_probe_candidates);
        let mut second: ElementsByRole = ctx.get(keys::SECOND_LEVEL).await?.unwrap_or_default();
        let start: usize = ctx.get(keys::PROGRESS).await?.unwrap_or(0);

        let probe = SecondLevelProbe {
            page: &*self.page,
            discovery: &self.discovery,
            executor: &self.executor,
            classifier: &self.classifier,
            picker: &*self.picker,
        };

        for (index, candidate) in candidates.iter().enumerate().skip(start) {
            match probe.probe(&page_url, &notice, &first_level, candidate).await {
                Ok(report) => {
                    info!(
                        locator = candidate.last_locator(),
                        outcome = ?report.outcome,
                        found = report.found.len(),
                        "probed candidate"
                    );
                    for element in report.found {
                        second.push(element);
                    }
                }
                Err(e) if e.is_fatal() || e.is_stale() => return Err(e),
                Err(e) => warn!(locator = candidate.last_locator(), error = %e, "probe failed, moving on"),
            }
            ctx.put(keys::SECOND_LEVEL, &second).await?;
            ctx.put(keys::PROGRESS, &(index + 1)).await?;
            self.reset_page(&url).await?;
        }

        let plan = InteractionPlan::new(first).with_second_level(second);
        ctx.put(keys::PROGRESS, &0usize).await?;
        let session = ctx.session_mut();
        session.reject_detected = plan.reject_detected();
        session.close_save_detected = plan.close_save_detected();
        session.ie_to_interact = plan.elements();
        session.second_level = plan.second_level;
        ctx.advance(Stage::PageInteraction).await
    }

    /// Clicks `element`; on a selector mismatch re-finds it once by tag and text.
    async fn execute(
        &self,
        url: &str,
        notice: &Notice,
        element: &InteractiveElement,
    ) -> Result<(ClickOutcome, InteractiveElement), AuditError> {
        element.validate()?;
        let outcome = self.executor.click_and_wait(&*self.page, &element.locator_path).await?;
        if outcome != ClickOutcome::WrongSelector {
            return Ok((outcome, element.clone()));
        }

        warn!(path = ?element.locator_path, "wrong selector, trying fallback locator");
        self.reset_page(url).await?;
        let current = match self.discovery.elements(&*self.page, &notice.locator).await {
            Ok(current) => current,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, "fallback discovery failed");
                return Ok((outcome, element.clone()));
            }
        };
        match relocate(&current, element)? {
            Some(relocated) => {
                let retried = self.executor.click_and_wait(&*self.page, &relocated.locator_path).await?;
                Ok((retried, relocated))
            }
            None => Ok((outcome, element.clone())),
        }
    }

    /// Visits unvisited same-origin links so lazily-set cookies show up.
    async fn explore(&self, interaction: &mut Interaction) -> Result<Vec<String>, AuditError> {
        if self.config.exploration_links == 0 {
            return Ok(Vec::new());
        }
        let current = parse_url(&self.page.current_url().await?)?;
        let nodes = self.page.descendants(DOCUMENT_ROOT).await?;
        let targets = exploration_targets(&nodes, &current, &interaction.visited_pages, self.config.exploration_links);

        let mut visited = Vec::new();
        for target in targets {
            if let Err(e) = self.page.navigate(&target).await {
                warn!(url = %target, error = %e, "exploration navigation failed");
                continue;
            }
            self.executor.quiescence().wait(&*self.page).await?;
            interaction.visited_pages.insert(target.clone());
            visited.push(target);
        }
        Ok(visited)
    }

    async fn interact(&self, ctx: &mut SessionContext) -> Result<(), AuditError> {
        let url = ctx.session().url.clone();
        let notice: Notice = ctx.artifact(keys::NOTICE).await?;
        let mut interaction: Interaction = ctx.get(keys::INTERACTION).await?.unwrap_or_default();
        let planned = ctx.session().ie_to_interact.clone();

        // recorded branches double as the resume cursor
        let done = ctx.session().cookies.branches.len();
        for element in planned.iter().skip(done) {
            let role = element.role.unwrap_or(Role::Other);
            self.reset_page(&url).await?;
            // each branch explores from scratch
            interaction.visited_pages.clear();
            interaction.current_element = Some(element.clone());
            ctx.put(keys::INTERACTION, &interaction).await?;

            let (outcome, executed) = self.execute(&url, &notice, element).await?;
            let succeeded = outcome.is_success();
            let visited_pages = if succeeded {
                self.explore(&mut interaction).await?
            } else {
                warn!(?role, path = ?element.locator_path, ?outcome, "interaction failed");
                Vec::new()
            };
            let cookies = self.tracker.capture(ctx, &*self.page, false).await?;
            info!(?role, succeeded, cookies = cookies.len(), "branch recorded");

            interaction.current_element = None;
            interaction.completed += 1;
            ctx.put(keys::INTERACTION, &interaction).await?;
            ctx.session_mut().cookies.branches.push(BranchOutcome {
                role,
                element: executed,
                succeeded,
                cookies,
                visited_pages,
            });
            ctx.commit().await?;
        }

        self.reset_page(&url).await?;
        self.detect_dark_patterns(ctx, &notice).await;

        let session = ctx.session_mut();
        session.cookie_violations = differential::analyze(&session.cookies, true);
        ctx.advance(Stage::Finished).await
    }

    /// Both checks are isolated: a failure is logged and the scan goes on.
    async fn detect_dark_patterns(&self, ctx: &mut SessionContext, notice: &Notice) {
        let status = match forced_action(&*self.page, notice, self.config.forced_action_samples).await {
            Ok(unreachable) if unreachable.is_empty() => ForcedActionStatus::Passed,
            Ok(unreachable) => ForcedActionStatus::Violated { unreachable },
            Err(e) => {
                warn!(error = %e, "forced action check skipped");
                ForcedActionStatus::Skipped { reason: e.message }
            }
        };
        ctx.session_mut().forced_action_status = status;

        let elements = ctx.session().interactive_elements.clone();
        match interface_interference(&*self.page, &elements, self.config.color_distance_threshold).await {
            Ok(Some(distance)) => {
                info!(distance = distance.distance, violation = distance.violation, "interface interference measured");
                ctx.session_mut().color_distances.push(distance);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "interface interference check skipped"),
        }
    }

    async fn interact_without_notice(&self, ctx: &mut SessionContext) -> Result<(), AuditError> {
        let url = ctx.session().url.clone();
        self.reset_page(&url).await?;

        let mut interaction: Interaction = ctx.get(keys::INTERACTION).await?.unwrap_or_default();
        match self.explore(&mut interaction).await {
            Ok(visited) => debug!(pages = visited.len(), "explored without notice"),
            Err(e) if e.is_stale() => return Err(e),
            Err(e) => warn!(error = %e, "exploration failed"),
        }
        ctx.put(keys::INTERACTION, &interaction).await?;

        let cookies = self.tracker.capture(ctx, &*self.page, false).await?;
        let session = ctx.session_mut();
        session.notice_detected = false;
        session.cookies.no_notice = cookies;
        session.cookie_violations = differential::analyze(&session.cookies, false);
        ctx.advance(Stage::Finished).await
    }

    async fn finish(&self, ctx: SessionContext) -> Result<ScanReport, AuditError> {
        ctx.ensure_active().await?;
        let report = ScanReport::from_session(ctx.session().clone());
        let path = self
            .reports
            .save_report(&report)
            .await
            .map_err(|e| AuditError::storage_error(e.to_string()))?;
        ctx.close().await?;
        info!(
            report_id = %report.report_id,
            path = %path.display(),
            violations = report.has_violations(),
            "scan finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentry_core::{Point, Rect};

    fn link(href: &str) -> NodeInfo {
        NodeInfo {
            locator: format!("a[{}]", href),
            tag_name: "a".to_string(),
            text: href.to_string(),
            rect: Rect::default(),
            visible: true,
            has_role: false,
            has_click_handler: true,
            pointer_cursor: true,
            href: Some(href.to_string()),
            target: None,
        }
    }

    #[test]
    fn exploration_stays_on_origin() {
        let current = Url::parse("https://shop.example/").unwrap();
        let nodes = vec![
            link("/about"),
            link("https://ads.example/x"),
            link("/about#team"),
            link("mailto:hi@shop.example"),
            link("/"),
            link("/cart"),
            link("/blog"),
        ];
        let mut visited = BTreeSet::new();
        visited.insert("https://shop.example/cart".to_string());

        let targets = exploration_targets(&nodes, &current, &visited, 3);
        assert_eq!(targets, vec!["https://shop.example/about", "https://shop.example/blog"]);
    }

    #[test]
    fn relocate_matches_tag_and_text() {
        let stale = InteractiveElement::first_level("html > body > div > button:nth-of-type(3)", "Reject all", "button", Point::default())
            .with_role(Role::Reject);
        let current = vec![
            InteractiveElement::first_level("html > body > div > a:nth-of-type(1)", "Reject all", "a", Point::default()),
            InteractiveElement::first_level("html > body > div > button:nth-of-type(2)", "Reject all", "button", Point::default()),
        ];
        let relocated = relocate(&current, &stale).unwrap().unwrap();
        assert_eq!(relocated.last_locator(), "html > body > div > button:nth-of-type(2)");
        assert_eq!(relocated.role, Some(Role::Reject));

        let mut broken = stale.clone();
        broken.locator_path.clear();
        assert!(relocate(&current, &broken).unwrap_err().is_fatal());
    }
}
