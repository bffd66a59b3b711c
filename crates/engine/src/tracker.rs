use crate::config::ScanConfig;
use crate::session::SessionContext;
use consentry_core::{
    AuditError, BrowserCookie, CookieClassifier, CookieRecord, CookieSnapshot, ObservedCookie, PageDriver,
};
use consentry_storage::keys;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Rolling per-cookie history with cached classification.
///
/// Records live in the session's store and are written through its context,
/// so an observation that outlived its session fails with `StaleSession`.
pub struct CookieTracker {
    classifier: Arc<dyn CookieClassifier>,
    reclassify_after_ms: i64,
    history_cap: usize,
}

impl CookieTracker {
    pub fn new(classifier: Arc<dyn CookieClassifier>, config: &ScanConfig) -> Self {
        Self {
            classifier,
            reclassify_after_ms: config.reclassify_after_ms,
            history_cap: config.cookie_history_cap,
        }
    }

    pub fn needs_classification(&self, record: &CookieRecord, now_ms: i64, force: bool) -> bool {
        force || !record.is_classified() || now_ms - record.label_timestamp > self.reclassify_after_ms
    }

    /// Records one cookie observation. The stored record is replaced as a whole,
    /// so a failure leaves the previous value in place for the next event.
    pub async fn observe(
        &self,
        ctx: &SessionContext,
        cookie: &BrowserCookie,
        now_ms: i64,
        force: bool,
    ) -> Result<CookieRecord, AuditError> {
        let store_key = keys::cookie(&cookie.key());
        let mut record = match ctx.get::<CookieRecord>(&store_key).await {
            Ok(Some(record)) => record,
            Ok(None) => CookieRecord::new(cookie),
            Err(e) => {
                error!(key = %store_key, error = %e, "failed to read cookie record");
                return Err(e);
            }
        };

        record.push_snapshot(CookieSnapshot::observe(cookie, now_ms), self.history_cap);

        if self.needs_classification(&record, now_ms, force) {
            let label = self.classifier.classify(&record.features()).await?;
            debug!(key = %store_key, label, "cookie classified");
            record.current_label = label;
            record.label_timestamp = now_ms;
        }

        if let Err(e) = ctx.put(&store_key, &record).await {
            if !e.is_stale() {
                error!(key = %store_key, error = %e, "failed to store cookie record");
            }
            return Err(e);
        }
        Ok(record)
    }

    /// Observes every cookie currently in the jar. Records that fail are logged
    /// and left out; they are retried on the next capture. A stale session stops the capture.
    pub async fn capture(
        &self,
        ctx: &SessionContext,
        page: &dyn PageDriver,
        force: bool,
    ) -> Result<Vec<ObservedCookie>, AuditError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let jar = page.cookies().await?;
        let mut observed = Vec::with_capacity(jar.len());
        for cookie in &jar {
            match self.observe(ctx, cookie, now_ms, force).await {
                Ok(record) => observed.push(ObservedCookie::from_record(&record)),
                Err(e) if e.is_stale() => return Err(e),
                Err(e) => warn!(cookie = %cookie.key(), error = %e, "cookie not recorded"),
            }
        }
        Ok(observed)
    }

    pub async fn record(&self, ctx: &SessionContext, key: &str) -> Result<Option<CookieRecord>, AuditError> {
        ctx.get(&keys::cookie(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use consentry_core::{CookieFeatures, SameSite, Stage};
    use consentry_storage::{KeyValueStore, MemoryStorage, load};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingClassifier {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CookieClassifier for CountingClassifier {
        async fn classify(&self, features: &CookieFeatures) -> Result<i32, AuditError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(if features.name.starts_with("_ga") { 2 } else { 0 })
        }
    }

    fn cookie(name: &str, value: &str) -> BrowserCookie {
        BrowserCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: ".shop.example".to_string(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: true,
            session: true,
            same_site: SameSite::Lax,
        }
    }

    fn tracker(classifier: Arc<CountingClassifier>) -> CookieTracker {
        CookieTracker::new(classifier, &ScanConfig::default())
    }

    async fn session(store: &Arc<dyn KeyValueStore>) -> SessionContext {
        SessionContext::begin(store.clone(), "https://shop.example/", Stage::NoticeSelection)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn history_is_capped_fifo() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStorage::new());
        let ctx = session(&store).await;
        let tracker = tracker(Arc::new(CountingClassifier::default()));
        for i in 0..11 {
            tracker
                .observe(&ctx, &cookie("_ga", &format!("v{}", i)), 1_000 + i, false)
                .await
                .unwrap();
        }
        let record = tracker.record(&ctx, "_ga;shop.example;/").await.unwrap().unwrap();
        assert_eq!(record.variable_data.len(), 10);
        assert_eq!(record.variable_data.front().unwrap().value, "v1");
        assert_eq!(record.variable_data.back().unwrap().value, "v10");
        assert_eq!(record.current_label, 2);
    }

    #[tokio::test]
    async fn label_is_cached_until_stale() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStorage::new());
        let ctx = session(&store).await;
        let classifier = Arc::new(CountingClassifier::default());
        let tracker = tracker(classifier.clone());

        tracker.observe(&ctx, &cookie("sid", "a"), 0, false).await.unwrap();
        tracker.observe(&ctx, &cookie("sid", "b"), 60_000, false).await.unwrap();
        tracker.observe(&ctx, &cookie("sid", "c"), 120_000, false).await.unwrap();
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 1);

        tracker.observe(&ctx, &cookie("sid", "d"), 120_001, false).await.unwrap();
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 2);

        tracker.observe(&ctx, &cookie("sid", "e"), 120_002, true).await.unwrap();
        assert_eq!(classifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_session_cannot_write_into_the_next_one() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStorage::new());
        let old = session(&store).await;
        let tracker = tracker(Arc::new(CountingClassifier::default()));

        SessionContext::cancel(&*store).await.unwrap();
        let current = session(&store).await;
        assert_eq!(current.id(), 2);

        let err = tracker.observe(&old, &cookie("_ga", "late"), 5_000, false).await.unwrap_err();
        assert!(err.is_stale());

        let leaked: Option<CookieRecord> = load(&*store, &keys::cookie("_ga;shop.example;/")).await.unwrap();
        assert!(leaked.is_none());
        assert!(tracker.record(&current, "_ga;shop.example;/").await.unwrap().is_none());
    }
}
