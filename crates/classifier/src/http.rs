use async_trait::async_trait;
use consentry_core::{
    AuditError, Capability, ClassifierService, CookieClassifier, CookieFeatures, DefaultErrorHealer,
    ErrorContext, ErrorHealer, HealingAction, Translation, Translator,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for a remote inference service exposing the classification,
/// translation and cookie-categorisation models over JSON.
pub struct HttpInferenceClient {
    client: Client,
    base_url: String,
    healer: Box<dyn ErrorHealer>,
}

#[derive(Deserialize)]
struct Labels<T> {
    labels: Vec<T>,
}

#[derive(Deserialize)]
struct CookieLabel {
    label: i32,
}

#[derive(Serialize)]
struct WarmUp {
    capability: Capability,
}

impl HttpInferenceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            healer: Box::new(DefaultErrorHealer::new(3)),
        }
    }

    pub fn with_healer(mut self, healer: Box<dyn ErrorHealer>) -> Self {
        self.healer = healer;
        self
    }

    async fn post_once<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, AuditError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AuditError::network_error(e.to_string()).with_context(json!({ "url": url })))?;

        let status = response.status();
        if !status.is_success() {
            let err = AuditError::network_error(format!("{} returned {}", url, status));
            // 4xx means the request itself is wrong, retrying will not help
            return Err(if status.is_client_error() {
                AuditError { recoverable: false, retry_after_ms: None, ..err }
            } else {
                err
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| AuditError::parsing_error(format!("{}: {}", url, e)))
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, AuditError> {
        let max_attempts = 3;
        let mut attempt = 0;
        loop {
            match self.post_once(path, body).await {
                Ok(r) => return Ok(r),
                Err(error) => {
                    attempt += 1;
                    let context = ErrorContext {
                        operation: path.to_string(),
                        error,
                        attempt,
                        max_attempts,
                    };
                    match self.healer.heal(&context).await {
                        HealingAction::Retry => {
                            debug!(path, attempt, "retrying inference request");
                        }
                        HealingAction::RetryAfter(ms) => {
                            debug!(path, attempt, delay_ms = ms, "retrying inference request");
                            tokio::time::sleep(Duration::from_millis(ms)).await;
                        }
                        HealingAction::Skip => {
                            warn!(path, attempt, error = %context.error, "inference request failed");
                            return Err(context.error);
                        }
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ClassifierService for HttpInferenceClient {
    async fn warm_up(
        &self,
        capability: Capability,
        progress: &(dyn Fn(f32) + Send + Sync),
    ) -> Result<(), AuditError> {
        progress(0.0);
        let _: serde_json::Value = self
            .post("/warmup", &WarmUp { capability })
            .await
            .map_err(|e| AuditError::classifier_load(e.message).with_context(e.context))?;
        progress(1.0);
        Ok(())
    }

    async fn purpose_labels(&self, sentences: &[String]) -> Result<Vec<i32>, AuditError> {
        let labels: Labels<i32> = self.post("/classify/purpose", &json!({ "sentences": sentences })).await?;
        Ok(labels.labels)
    }

    async fn role_labels(&self, texts: &[String]) -> Result<Vec<String>, AuditError> {
        let labels: Labels<String> = self.post("/classify/role", &json!({ "texts": texts })).await?;
        Ok(labels.labels)
    }
}

#[async_trait]
impl Translator for HttpInferenceClient {
    async fn translate(&self, text: &str) -> Result<Translation, AuditError> {
        if text.trim().is_empty() {
            return Ok(Translation {
                result_text: String::new(),
                source_language: "und".to_string(),
            });
        }
        self.post("/translate", &json!({ "text": text })).await
    }
}

#[async_trait]
impl CookieClassifier for HttpInferenceClient {
    async fn classify(&self, features: &CookieFeatures) -> Result<i32, AuditError> {
        let label: CookieLabel = self.post("/classify/cookie", features).await?;
        Ok(label.label)
    }
}
