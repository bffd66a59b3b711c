use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error categories for better error handling and recovery
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (timeouts, connection failures)
    Network,
    /// Element not found or selector issues
    ElementNotFound,
    /// JavaScript execution errors
    ScriptExecution,
    /// Navigation or page load errors
    Navigation,
    /// Browser/driver errors
    Browser,
    /// Parsing errors (HTML/JSON)
    Parsing,
    /// Timeout errors
    Timeout,
    /// Classifier produced output outside its label space
    Classifier,
    /// Classifier could not be warmed up
    ClassifierLoad,
    /// Persistent store read/write failures
    Storage,
    /// Locator path with a depth other than 1 or 2
    InvalidLocator,
    /// A persisted artifact a stage depends on is absent
    MissingArtifact,
    /// A write was attempted on behalf of a session that is no longer active
    StaleSession,
    /// A scan was requested while another one is still in flight
    SessionBusy,
    /// Unknown or uncategorized errors
    Unknown,
}

/// Structured error with context for better debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditError {
    /// Error category for programmatic handling
    pub category: ErrorCategory,
    /// Human-readable error message
    pub message: String,
    /// Optional context (URL, locator, stage, etc.)
    pub context: serde_json::Value,
    /// Whether this error is potentially recoverable
    pub recoverable: bool,
    /// Suggested retry delay in milliseconds
    pub retry_after_ms: Option<u64>,
}

impl AuditError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: serde_json::json!({}),
            recoverable: false,
            retry_after_ms: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    pub fn with_retry_delay(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self.recoverable = true;
        self
    }

    /// Fatal errors abort the current scan step and surface to the operator.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category,
            ErrorCategory::InvalidLocator | ErrorCategory::Classifier | ErrorCategory::MissingArtifact
        )
    }

    pub fn is_stale(&self) -> bool {
        self.category == ErrorCategory::StaleSession
    }

    // Convenience constructors
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message).with_retry_delay(1000)
    }

    pub fn element_not_found(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        Self::new(ErrorCategory::ElementNotFound, format!("Element not found: {}", locator))
            .with_context(serde_json::json!({ "locator": locator }))
            .recoverable()
    }

    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Timeout, message).with_retry_delay(2000)
    }

    pub fn script_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ScriptExecution, message)
    }

    pub fn navigation_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Navigation, message).with_retry_delay(1500)
    }

    pub fn browser_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Browser, message)
    }

    pub fn parsing_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Parsing, message)
    }

    pub fn classifier_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Classifier, message)
    }

    pub fn classifier_load(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::ClassifierLoad, message)
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Storage, message)
    }

    pub fn invalid_locator(depth: usize) -> Self {
        Self::new(
            ErrorCategory::InvalidLocator,
            format!("Locator path depth must be 1 or 2, got {}", depth),
        )
        .with_context(serde_json::json!({ "depth": depth }))
    }

    pub fn missing_artifact(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(ErrorCategory::MissingArtifact, format!("Required artifact missing: {}", key))
            .with_context(serde_json::json!({ "key": key }))
    }

    pub fn stale_session(expected: u64, active: Option<u64>) -> Self {
        Self::new(
            ErrorCategory::StaleSession,
            format!("Session {} is no longer active (active: {:?})", expected, active),
        )
        .with_context(serde_json::json!({ "session_id": expected, "active_id": active }))
    }

    pub fn session_busy(active: u64) -> Self {
        Self::new(ErrorCategory::SessionBusy, format!("Session {} is still in flight", active))
            .with_context(serde_json::json!({ "active_id": active }))
    }
}

impl std::fmt::Display for AuditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.category, self.message)
    }
}

impl std::error::Error for AuditError {}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        AuditError::parsing_error(e.to_string())
    }
}

/// Context passed to error healing hooks
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub error: AuditError,
    pub attempt: u32,
    pub max_attempts: u32,
}

/// Result of an error healing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealingAction {
    /// Retry immediately
    Retry,
    /// Retry after a delay (milliseconds)
    RetryAfter(u64),
    /// Give up on this operation
    Skip,
}

/// Decides whether a failed collaborator call is retried
#[async_trait]
pub trait ErrorHealer: Send + Sync {
    async fn heal(&self, context: &ErrorContext) -> HealingAction;
}

/// Default error healer with simple retry logic
pub struct DefaultErrorHealer {
    pub max_retries: u32,
}

impl DefaultErrorHealer {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }
}

#[async_trait]
impl ErrorHealer for DefaultErrorHealer {
    async fn heal(&self, context: &ErrorContext) -> HealingAction {
        if context.attempt >= self.max_retries {
            return HealingAction::Skip;
        }

        if !context.error.recoverable {
            return HealingAction::Skip;
        }

        match context.error.retry_after_ms {
            Some(delay) => HealingAction::RetryAfter(delay),
            None => HealingAction::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_categories() {
        assert!(AuditError::invalid_locator(3).is_fatal());
        assert!(AuditError::missing_artifact("selection/notice").is_fatal());
        assert!(AuditError::classifier_error("LABEL_9").is_fatal());
        assert!(!AuditError::element_not_found("html > body").is_fatal());
        assert!(AuditError::stale_session(2, Some(3)).is_stale());
    }

    #[tokio::test]
    async fn default_healer_respects_budget_and_recoverability() {
        let healer = DefaultErrorHealer::new(2);
        let mut ctx = ErrorContext {
            operation: "role_labels".into(),
            error: AuditError::network_error("connection reset"),
            attempt: 0,
            max_attempts: 2,
        };
        assert_eq!(healer.heal(&ctx).await, HealingAction::RetryAfter(1000));

        ctx.attempt = 2;
        assert_eq!(healer.heal(&ctx).await, HealingAction::Skip);

        ctx.attempt = 0;
        ctx.error = AuditError::classifier_error("bad label");
        assert_eq!(healer.heal(&ctx).await, HealingAction::Skip);
    }
}
