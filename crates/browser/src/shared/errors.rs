use consentry_core::AuditError;

pub fn to_audit_error(e: impl std::fmt::Display, action: &str) -> AuditError {
    let s = e.to_string();
    if s.contains("timeout") || s.contains("Timeout") {
        AuditError::timeout_error(format!("{} timed out: {}", action, s))
    } else if s.contains("navigation") || s.contains("Navigation") {
        AuditError::navigation_error(format!("{} navigation failed: {}", action, s))
    } else if s.contains("not found") || s.contains("null") {
        AuditError::element_not_found(format!("{}: {}", action, s))
    } else if s.contains("Uncaught") || s.contains("ReferenceError") || s.contains("TypeError") {
        AuditError::script_error(format!("{} script failed: {}", action, s))
    } else {
        AuditError::browser_error(format!("{} failed: {}", action, s))
    }
}

/// Errors raised while the page is being replaced; the call can be retried on the new document.
pub fn is_context_loss(e: &impl std::fmt::Display) -> bool {
    let s = e.to_string();
    s.contains("Cannot find context") || s.contains("Execution context was destroyed")
}
