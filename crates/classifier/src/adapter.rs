use crate::sentences::split_sentences;
use consentry_core::{
    AuditError, Capability, ClassifierService, InteractiveElement, Notification, Notifier, Role, Translator,
};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Purpose and role classification over translated text batches.
///
/// Each capability is warmed up at most once; concurrent callers share the
/// same in-flight initialization. Results are always index-aligned with the input.
pub struct ClassifierAdapter {
    service: Arc<dyn ClassifierService>,
    translator: Arc<dyn Translator>,
    notifier: Arc<dyn Notifier>,
    purpose_ready: OnceCell<()>,
    role_ready: OnceCell<()>,
}

impl ClassifierAdapter {
    pub fn new(
        service: Arc<dyn ClassifierService>,
        translator: Arc<dyn Translator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            service,
            translator,
            notifier,
            purpose_ready: OnceCell::new(),
            role_ready: OnceCell::new(),
        }
    }

    pub async fn ready(&self, capability: Capability) -> Result<(), AuditError> {
        let cell = match capability {
            Capability::Purpose => &self.purpose_ready,
            Capability::Role => &self.role_ready,
        };
        let result = cell
            .get_or_try_init(|| async {
                info!(?capability, "warming up classifier");
                let progress = move |p: f32| debug!(?capability, progress = p, "classifier loading");
                self.service.warm_up(capability, &progress).await
            })
            .await;

        if let Err(e) = &result {
            warn!(?capability, error = %e, "classifier failed to load");
            self.notifier.notify(Notification::ClassifierLoadFailed {
                capability,
                message: e.message.clone(),
            });
            return Err(AuditError::classifier_load(e.message.clone()).with_context(e.context.clone()));
        }
        Ok(())
    }

    /// Translates every text concurrently; output order matches input order.
    pub async fn translate_all(&self, texts: &[String]) -> Result<Vec<String>, AuditError> {
        let translations = try_join_all(texts.iter().map(|t| self.translator.translate(t))).await?;
        Ok(translations.into_iter().map(|t| t.result_text).collect())
    }

    /// True iff at least one sentence of `text` asserts an explicit purpose.
    pub async fn purpose_declared(&self, text: &str) -> Result<bool, AuditError> {
        self.ready(Capability::Purpose).await?;
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Ok(false);
        }
        let labels = self.service.purpose_labels(&sentences).await?;
        ensure_aligned("purpose", sentences.len(), labels.len())?;
        Ok(labels.iter().any(|&label| label > 0))
    }

    pub async fn role_of(&self, texts: &[String]) -> Result<Vec<Role>, AuditError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.ready(Capability::Role).await?;
        let raw = self.service.role_labels(texts).await?;
        ensure_aligned("role", texts.len(), raw.len())?;
        raw.iter()
            .map(|label| Role::from_raw_label(label).map_err(AuditError::from))
            .collect()
    }

    /// Translates each element's innermost text and assigns the classified role.
    pub async fn label_elements(
        &self,
        mut elements: Vec<InteractiveElement>,
    ) -> Result<Vec<InteractiveElement>, AuditError> {
        let texts: Vec<String> = elements.iter().map(|e| e.label_text().to_string()).collect();
        let translated = self.translate_all(&texts).await?;
        let roles = self.role_of(&translated).await?;
        for (element, role) in elements.iter_mut().zip(roles) {
            element.role = Some(role);
        }
        Ok(elements)
    }
}

fn ensure_aligned(what: &str, expected: usize, got: usize) -> Result<(), AuditError> {
    if expected != got {
        return Err(AuditError::classifier_error(format!(
            "{} classifier returned {} labels for {} inputs",
            what, got, expected
        )));
    }
    Ok(())
}
