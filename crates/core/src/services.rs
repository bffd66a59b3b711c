use crate::cookie::CookieFeatures;
use crate::error::AuditError;
use crate::page::PageDriver;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Purpose,
    Role,
}

/// Text-classification model inference
#[async_trait]
pub trait ClassifierService: Send + Sync {
    /// Loads the model behind `capability`, reporting progress in `[0, 1]`.
    async fn warm_up(
        &self,
        capability: Capability,
        progress: &(dyn Fn(f32) + Send + Sync),
    ) -> Result<(), AuditError>;

    async fn purpose_labels(&self, sentences: &[String]) -> Result<Vec<i32>, AuditError>;

    async fn role_labels(&self, texts: &[String]) -> Result<Vec<String>, AuditError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub result_text: String,
    pub source_language: String,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<Translation, AuditError>;
}

#[async_trait]
pub trait CookieClassifier: Send + Sync {
    async fn classify(&self, features: &CookieFeatures) -> Result<i32, AuditError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickReason {
    /// The notice to audit
    Initial,
    /// A new layer opened above the notice after a probe click
    NewLayer,
}

/// Marks the notice element; suspends until a locator is confirmed or declined.
#[async_trait]
pub trait NoticePicker: Send + Sync {
    async fn pick(&self, page: &dyn PageDriver, reason: PickReason) -> Result<Option<String>, AuditError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    SelectorTimeout { root: String, budget_ms: u64 },
    ClassifierLoadFailed { capability: Capability, message: String },
}

/// Operator-visible notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}
