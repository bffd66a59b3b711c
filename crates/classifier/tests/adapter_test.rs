use async_trait::async_trait;
use consentry_classifier::ClassifierAdapter;
use consentry_core::{
    AuditError, Capability, ClassifierService, ErrorCategory, InteractiveElement, Notification, Notifier, Point,
    Role, Translation, Translator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockService {
    warm_ups: AtomicUsize,
    fail_warm_up: bool,
}

#[async_trait]
impl ClassifierService for MockService {
    async fn warm_up(&self, _capability: Capability, progress: &(dyn Fn(f32) + Send + Sync)) -> Result<(), AuditError> {
        self.warm_ups.fetch_add(1, Ordering::SeqCst);
        progress(0.5);
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.fail_warm_up {
            return Err(AuditError::network_error("model download failed"));
        }
        Ok(())
    }

    async fn purpose_labels(&self, sentences: &[String]) -> Result<Vec<i32>, AuditError> {
        Ok(sentences
            .iter()
            .map(|s| if s.contains("analytics") { 2 } else { 0 })
            .collect())
    }

    async fn role_labels(&self, texts: &[String]) -> Result<Vec<String>, AuditError> {
        Ok(texts
            .iter()
            .map(|t| match t.to_lowercase().as_str() {
                "accept all" => "LABEL_0".to_string(),
                "close" => "LABEL_1".to_string(),
                "settings" => "LABEL_2".to_string(),
                "reject all" => "LABEL_4".to_string(),
                "save" => "LABEL_5".to_string(),
                "bogus" => "LABEL_42".to_string(),
                _ => "LABEL_3".to_string(),
            })
            .collect())
    }
}

/// Finishes earlier items later to shake out ordering bugs.
struct SlowTranslator;

#[async_trait]
impl Translator for SlowTranslator {
    async fn translate(&self, text: &str) -> Result<Translation, AuditError> {
        let delay = 60u64.saturating_sub(text.len() as u64 * 5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        let result_text = match text {
            "Alle akzeptieren" => "Accept all",
            "Alle ablehnen" => "Reject all",
            other => other,
        };
        Ok(Translation {
            result_text: result_text.to_string(),
            source_language: "de".to_string(),
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

fn adapter(service: Arc<MockService>, notifier: Arc<RecordingNotifier>) -> ClassifierAdapter {
    ClassifierAdapter::new(service, Arc::new(SlowTranslator), notifier)
}

#[tokio::test]
async fn concurrent_warm_up_is_coalesced() {
    let service = Arc::new(MockService::default());
    let adapter = adapter(service.clone(), Arc::new(RecordingNotifier::default()));

    let (a, b, c) = tokio::join!(
        adapter.ready(Capability::Role),
        adapter.ready(Capability::Role),
        adapter.ready(Capability::Role),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(service.warm_ups.load(Ordering::SeqCst), 1);

    adapter.ready(Capability::Purpose).await.unwrap();
    assert_eq!(service.warm_ups.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn role_of_is_index_aligned() {
    let adapter = adapter(Arc::new(MockService::default()), Arc::new(RecordingNotifier::default()));
    let texts: Vec<String> = ["Settings", "Accept all", "more info", "Reject all", "Close", "Save"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let roles = adapter.role_of(&texts).await.unwrap();
    assert_eq!(
        roles,
        vec![Role::Settings, Role::Accept, Role::Other, Role::Reject, Role::Close, Role::SaveSettings]
    );
    assert!(adapter.role_of(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn unmapped_label_is_fatal() {
    let adapter = adapter(Arc::new(MockService::default()), Arc::new(RecordingNotifier::default()));
    let err = adapter.role_of(&["bogus".to_string()]).await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::Classifier);
    assert!(err.is_fatal());
}

#[tokio::test]
async fn translation_keeps_input_order() {
    let adapter = adapter(Arc::new(MockService::default()), Arc::new(RecordingNotifier::default()));
    let texts = vec!["Alle ablehnen".to_string(), "x".to_string(), "Alle akzeptieren".to_string()];
    let translated = adapter.translate_all(&texts).await.unwrap();
    assert_eq!(translated, vec!["Reject all", "x", "Accept all"]);
}

#[tokio::test]
async fn label_elements_assigns_roles_from_translated_text() {
    let adapter = adapter(Arc::new(MockService::default()), Arc::new(RecordingNotifier::default()));
    let elements = vec![
        InteractiveElement::first_level("div > button:nth-of-type(1)", "Alle akzeptieren", "button", Point::default()),
        InteractiveElement::first_level("div > button:nth-of-type(2)", "Alle ablehnen", "button", Point::default()),
    ];
    let labeled = adapter.label_elements(elements).await.unwrap();
    assert_eq!(labeled[0].role, Some(Role::Accept));
    assert_eq!(labeled[1].role, Some(Role::Reject));
    // original text is kept, only the role comes from the translation
    assert_eq!(labeled[1].label_text(), "Alle ablehnen");
}

#[tokio::test]
async fn purpose_requires_a_positive_sentence() {
    let adapter = adapter(Arc::new(MockService::default()), Arc::new(RecordingNotifier::default()));
    assert!(adapter
        .purpose_declared("We value your privacy. We use analytics cookies to improve the site.")
        .await
        .unwrap());
    assert!(!adapter.purpose_declared("We value your privacy.").await.unwrap());
    assert!(!adapter.purpose_declared("").await.unwrap());
}

#[tokio::test]
async fn load_failure_notifies_operator() {
    let service = Arc::new(MockService { fail_warm_up: true, ..Default::default() });
    let notifier = Arc::new(RecordingNotifier::default());
    let adapter = adapter(service, notifier.clone());

    let err = adapter.purpose_declared("We use cookies.").await.unwrap_err();
    assert_eq!(err.category, ErrorCategory::ClassifierLoad);
    let seen = notifier.seen.lock().unwrap();
    assert!(matches!(
        seen.as_slice(),
        [Notification::ClassifierLoadFailed { capability: Capability::Purpose, .. }]
    ));
}
