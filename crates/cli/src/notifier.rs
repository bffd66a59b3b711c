use consentry_core::{Notification, Notifier};
use tracing::warn;

/// Surfaces operator notifications as log events.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::SelectorTimeout { root, budget_ms } => {
                warn!(%root, budget_ms, "element discovery ran out of time, mark the notice manually");
            }
            Notification::ClassifierLoadFailed { capability, message } => {
                warn!(?capability, %message, "classifier could not be loaded");
            }
        }
    }
}
