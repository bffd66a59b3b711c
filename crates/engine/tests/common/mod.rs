#![allow(dead_code)]

use async_trait::async_trait;
use consentry_classifier::ClassifierAdapter;
use consentry_core::{
    AuditError, BoundingBox, BrowserCookie, Capability, ClassifierService, CookieClassifier, CookieFeatures,
    Dimensions, ElementState, FrameStatus, NodeInfo, Notification, Notifier, NoticePicker, OverlayCandidate,
    PageDriver, PickReason, Rect, SameSite, Translation, Translator,
};
use consentry_engine::{Collaborators, ScanConfig, SessionContext};
use consentry_storage::{KeyValueStore, MemoryStorage};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const URL: &str = "https://shop.example/";
pub const NOTICE: &str = "html > body > div:nth-of-type(1)";

pub fn child(parent: &str, segment: &str) -> String {
    format!("{} > {}", parent, segment)
}

fn node(locator: &str, tag: &str, text: &str, x: f64, y: f64, clickable: bool) -> NodeInfo {
    NodeInfo {
        locator: locator.to_string(),
        tag_name: tag.to_string(),
        text: text.to_string(),
        rect: Rect { x, y, width: 80.0, height: 30.0 },
        visible: true,
        has_role: false,
        has_click_handler: clickable,
        pointer_cursor: false,
        href: None,
        target: None,
    }
}

pub fn button(locator: &str, text: &str, x: f64, y: f64) -> NodeInfo {
    node(locator, "button", text, x, y, true)
}

pub fn container(locator: &str, y: f64, height: f64) -> NodeInfo {
    NodeInfo {
        rect: Rect { x: 0.0, y, width: 1280.0, height },
        ..node(locator, "div", "", 0.0, y, false)
    }
}

pub fn link(locator: &str, text: &str, href: &str, x: f64, y: f64) -> NodeInfo {
    NodeInfo {
        href: Some(href.to_string()),
        ..node(locator, "a", text, x, y, true)
    }
}

pub fn cookie(name: &str) -> BrowserCookie {
    BrowserCookie {
        name: name.to_string(),
        value: format!("{}-value", name),
        domain: ".shop.example".to_string(),
        path: "/".to_string(),
        expires: Some(4_102_444_800.0),
        http_only: false,
        secure: true,
        session: false,
        same_site: SameSite::Lax,
    }
}

pub fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Clone, Default)]
pub struct Scene {
    pub nodes: Vec<NodeInfo>,
    pub footprints: HashMap<String, (Vec<String>, Dimensions)>,
    pub covered: HashSet<String>,
    pub overlays: Vec<OverlayCandidate>,
    pub cookies_on_load: Vec<BrowserCookie>,
}

impl Scene {
    pub fn with_footprint(mut self, root: &str, fragments: &[&str], width: u32, height: u32) -> Self {
        self.footprints
            .insert(root.to_string(), (texts(fragments), Dimensions { width, height }));
        self
    }
}

/// What clicking a locator does to the page
#[derive(Clone, Default)]
pub struct Transition {
    pub scene: Option<String>,
    pub cookies: Vec<BrowserCookie>,
}

#[derive(Default)]
struct PageState {
    url: String,
    scene: String,
    loads: usize,
    jar: Vec<BrowserCookie>,
    clicks: Vec<String>,
    mutations: u64,
}

/// Scripted page: scenes of nodes, switched by clicks and page loads.
#[derive(Default)]
pub struct MockPage {
    pub scenes: HashMap<String, Scene>,
    /// Scene shown after the n-th load; the last one repeats
    pub load_sequence: Vec<String>,
    pub transitions: HashMap<String, Transition>,
    pub colors: HashMap<String, [u8; 3]>,
    /// Cookies set by loading a specific URL
    pub visit_cookies: HashMap<String, Vec<BrowserCookie>>,
    pub descendants_delay: Option<Duration>,
    state: Mutex<PageState>,
}

fn is_under(locator: &str, root: &str) -> bool {
    locator.starts_with(&format!("{} >", root))
}

fn set_cookie(jar: &mut Vec<BrowserCookie>, cookie: &BrowserCookie) {
    jar.retain(|c| c.key() != cookie.key());
    jar.push(cookie.clone());
}

fn solid_png(rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(16, 8, image::Rgb(rgb));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

impl MockPage {
    pub fn new(scenes: Vec<(&str, Scene)>) -> Self {
        Self {
            load_sequence: vec![scenes[0].0.to_string()],
            scenes: scenes.into_iter().map(|(name, scene)| (name.to_string(), scene)).collect(),
            ..Default::default()
        }
    }

    pub fn on_click(mut self, locator: &str, transition: Transition) -> Self {
        self.transitions.insert(locator.to_string(), transition);
        self
    }

    pub fn loads(mut self, sequence: &[&str]) -> Self {
        self.load_sequence = sequence.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn color(mut self, locator: &str, rgb: [u8; 3]) -> Self {
        self.colors.insert(locator.to_string(), rgb);
        self
    }

    pub fn on_visit(mut self, url: &str, cookies: Vec<BrowserCookie>) -> Self {
        self.visit_cookies.insert(url.to_string(), cookies);
        self
    }

    pub fn slow_descendants(mut self, delay: Duration) -> Self {
        self.descendants_delay = Some(delay);
        self
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state.lock().unwrap().clicks.clone()
    }

    fn scene(&self) -> Scene {
        let name = self.state.lock().unwrap().scene.clone();
        self.scenes.get(&name).cloned().unwrap_or_default()
    }

    fn find(&self, locator: &str) -> Option<NodeInfo> {
        self.scene().nodes.into_iter().find(|n| n.locator == locator)
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn current_url(&self) -> Result<String, AuditError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn navigate(&self, url: &str) -> Result<(), AuditError> {
        let mut state = self.state.lock().unwrap();
        let index = state.loads.min(self.load_sequence.len() - 1);
        state.url = url.to_string();
        state.scene = self.load_sequence[index].clone();
        state.loads += 1;
        state.mutations = 0;
        if let Some(scene) = self.scenes.get(&state.scene) {
            for cookie in &scene.cookies_on_load {
                set_cookie(&mut state.jar, cookie);
            }
        }
        for cookie in self.visit_cookies.get(url).into_iter().flatten() {
            set_cookie(&mut state.jar, cookie);
        }
        Ok(())
    }

    async fn clear_cookies(&self) -> Result<(), AuditError> {
        self.state.lock().unwrap().jar.clear();
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<BrowserCookie>, AuditError> {
        Ok(self.state.lock().unwrap().jar.clone())
    }

    async fn element_state(&self, locator: &str) -> Result<Option<ElementState>, AuditError> {
        let scene = self.scene();
        Ok(scene.nodes.iter().find(|n| n.locator == locator).map(|n| ElementState {
            locator: n.locator.clone(),
            visible: n.visible,
            covered: scene.covered.contains(&n.locator),
            bounding_box: BoundingBox::from_rect(&n.rect),
            tag_name: n.tag_name.clone(),
            href: n.href.clone(),
            target: n.target.clone(),
        }))
    }

    async fn descendants(&self, root: &str) -> Result<Vec<NodeInfo>, AuditError> {
        if let Some(delay) = self.descendants_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .scene()
            .nodes
            .into_iter()
            .filter(|n| is_under(&n.locator, root))
            .collect())
    }

    async fn footprint_data(&self, root: &str) -> Result<Option<(Vec<String>, Dimensions)>, AuditError> {
        Ok(self.scene().footprints.get(root).cloned())
    }

    async fn click(&self, locator: &str) -> Result<Vec<FrameStatus>, AuditError> {
        if self.find(locator).is_none() {
            return Ok(vec![FrameStatus::WrongSelector]);
        }
        let mut state = self.state.lock().unwrap();
        state.clicks.push(locator.to_string());
        state.mutations += 1;
        if let Some(transition) = self.transitions.get(locator) {
            if let Some(scene) = &transition.scene {
                state.scene = scene.clone();
            }
            for cookie in &transition.cookies {
                set_cookie(&mut state.jar, cookie);
            }
        }
        Ok(vec![FrameStatus::Success, FrameStatus::NotApplicable])
    }

    async fn mutation_count(&self) -> Result<u64, AuditError> {
        Ok(self.state.lock().unwrap().mutations)
    }

    async fn capture(&self, locator: &str) -> Result<Option<Vec<u8>>, AuditError> {
        Ok(self.colors.get(locator).map(|rgb| solid_png(*rgb)))
    }

    async fn viewport(&self) -> Result<Dimensions, AuditError> {
        Ok(Dimensions { width: 1280, height: 800 })
    }

    async fn overlay_candidates(&self) -> Result<Vec<OverlayCandidate>, AuditError> {
        Ok(self.scene().overlays)
    }
}

/// Role and purpose labels looked up from the text
#[derive(Default)]
pub struct MockClassifier;

#[async_trait]
impl ClassifierService for MockClassifier {
    async fn warm_up(&self, _capability: Capability, progress: &(dyn Fn(f32) + Send + Sync)) -> Result<(), AuditError> {
        progress(1.0);
        Ok(())
    }

    async fn purpose_labels(&self, sentences: &[String]) -> Result<Vec<i32>, AuditError> {
        Ok(sentences
            .iter()
            .map(|s| i32::from(s.contains("analytics") || s.contains("advertising")))
            .collect())
    }

    async fn role_labels(&self, texts: &[String]) -> Result<Vec<String>, AuditError> {
        Ok(texts
            .iter()
            .map(|t| {
                let label = match t.to_lowercase().as_str() {
                    "accept all" => 0,
                    "close" => 1,
                    "settings" => 2,
                    "reject all" => 4,
                    "save choices" => 5,
                    _ => 3,
                };
                format!("LABEL_{}", label)
            })
            .collect())
    }
}

#[async_trait]
impl Translator for MockClassifier {
    async fn translate(&self, text: &str) -> Result<Translation, AuditError> {
        Ok(Translation {
            result_text: text.to_string(),
            source_language: "en".to_string(),
        })
    }
}

#[async_trait]
impl CookieClassifier for MockClassifier {
    async fn classify(&self, features: &CookieFeatures) -> Result<i32, AuditError> {
        Ok(match features.name.as_str() {
            "_ga" | "_gid" => 2,
            "_fbp" => 3,
            _ => 0,
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

/// Answers with fixed locators and counts how often it was asked.
#[derive(Default)]
pub struct MockPicker {
    pub initial: Option<String>,
    pub new_layer: Option<String>,
    pub calls: Mutex<Vec<PickReason>>,
}

impl MockPicker {
    pub fn notice(locator: &str) -> Self {
        Self {
            initial: Some(locator.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl NoticePicker for MockPicker {
    async fn pick(&self, _page: &dyn PageDriver, reason: PickReason) -> Result<Option<String>, AuditError> {
        self.calls.lock().unwrap().push(reason);
        Ok(match reason {
            PickReason::Initial => self.initial.clone(),
            PickReason::NewLayer => self.new_layer.clone(),
        })
    }
}

/// Cancels the running session while the operator is "marking" the notice.
pub struct CancellingPicker {
    pub store: Arc<dyn KeyValueStore>,
}

#[async_trait]
impl NoticePicker for CancellingPicker {
    async fn pick(&self, _page: &dyn PageDriver, _reason: PickReason) -> Result<Option<String>, AuditError> {
        SessionContext::cancel(&*self.store).await?;
        Ok(Some(NOTICE.to_string()))
    }
}

pub fn test_config() -> ScanConfig {
    ScanConfig {
        quiet_interval_ms: 20,
        quiescence_timeout_ms: 200,
        poll_interval_ms: 5,
        exploration_links: 0,
        ..Default::default()
    }
}

pub struct Harness {
    pub page: Arc<MockPage>,
    pub store: Arc<MemoryStorage>,
    pub notifier: Arc<RecordingNotifier>,
    pub collaborators: Collaborators,
}

pub fn harness(page: MockPage, picker: Arc<dyn NoticePicker>) -> Harness {
    let page = Arc::new(page);
    let store = Arc::new(MemoryStorage::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let models = Arc::new(MockClassifier);
    let collaborators = Collaborators {
        page: page.clone(),
        store: store.clone(),
        reports: store.clone(),
        classifier: Arc::new(ClassifierAdapter::new(models.clone(), models.clone(), notifier.clone())),
        cookie_classifier: models,
        picker,
        notifier: notifier.clone(),
    };
    Harness {
        page,
        store,
        notifier,
        collaborators,
    }
}
