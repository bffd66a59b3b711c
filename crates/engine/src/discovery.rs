use consentry_core::{AuditError, InteractiveElement, NodeInfo, Notice, Notification, Notifier, PageDriver, Point};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Clickable affordance exposed by role attribute, click handler, or pointer cursor
pub fn is_clickable(node: &NodeInfo) -> bool {
    node.visible && (node.has_role || node.has_click_handler || node.pointer_cursor)
}

/// `child` lies strictly below `ancestor` in the locator tree, shadow hops included.
pub fn is_descendant(child: &str, ancestor: &str) -> bool {
    child.len() > ancestor.len() && child.starts_with(ancestor) && child[ancestor.len()..].starts_with(" >")
}

/// Keeps only candidates that are not nested inside another kept candidate.
/// Expects document order, where ancestors precede their descendants.
pub fn select_maximal(nodes: Vec<NodeInfo>) -> Vec<NodeInfo> {
    let mut kept: Vec<NodeInfo> = Vec::new();
    for node in nodes {
        if kept.iter().any(|k| is_descendant(&node.locator, &k.locator)) {
            continue;
        }
        kept.push(node);
    }
    kept
}

fn to_element(node: NodeInfo) -> InteractiveElement {
    InteractiveElement::first_level(
        node.locator,
        node.text,
        node.tag_name,
        Point {
            x: node.rect.x,
            y: node.rect.y,
        },
    )
    .with_link(node.href, node.target)
}

pub struct Discovery {
    budget: Duration,
    notifier: Arc<dyn Notifier>,
}

impl Discovery {
    pub fn new(budget: Duration, notifier: Arc<dyn Notifier>) -> Self {
        Self { budget, notifier }
    }

    /// Maximal clickable descendants of `root`, unlabeled.
    ///
    /// The whole enumeration runs under the discovery budget; when it runs out the
    /// operator is notified and no partial result is returned.
    pub async fn elements(&self, page: &dyn PageDriver, root: &str) -> Result<Vec<InteractiveElement>, AuditError> {
        let nodes = match tokio::time::timeout(self.budget, page.descendants(root)).await {
            Ok(nodes) => nodes?,
            Err(_) => {
                let budget_ms = self.budget.as_millis() as u64;
                warn!(root, budget_ms, "locator computation exceeded budget");
                self.notifier.notify(Notification::SelectorTimeout {
                    root: root.to_string(),
                    budget_ms,
                });
                return Err(AuditError::timeout_error(format!(
                    "Discovery under '{}' exceeded {}ms",
                    root, budget_ms
                ))
                .with_context(serde_json::json!({ "root": root })));
            }
        };

        let total = nodes.len();
        let elements: Vec<InteractiveElement> = select_maximal(nodes.into_iter().filter(is_clickable).collect())
            .into_iter()
            .map(to_element)
            .collect();
        debug!(root, total, kept = elements.len(), "discovered interactive elements");
        Ok(elements)
    }

    /// Resolves the marked notice and captures its canonical locator, text and box.
    pub async fn notice(&self, page: &dyn PageDriver, locator: &str) -> Result<Notice, AuditError> {
        let state = page
            .element_state(locator)
            .await?
            .ok_or_else(|| AuditError::element_not_found(locator))?;
        let text = page
            .footprint_data(&state.locator)
            .await?
            .map(|(texts, _)| texts.join(" "))
            .unwrap_or_default();
        Ok(Notice {
            locator: state.locator,
            text,
            label: None,
            bounding_box: state.bounding_box,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentry_core::Rect;

    fn node(locator: &str, visible: bool, has_role: bool) -> NodeInfo {
        NodeInfo {
            locator: locator.to_string(),
            tag_name: "div".to_string(),
            text: String::new(),
            rect: Rect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
            visible,
            has_role,
            has_click_handler: false,
            pointer_cursor: false,
            href: None,
            target: None,
        }
    }

    #[test]
    fn descendant_check_respects_segment_boundaries() {
        assert!(is_descendant("html > body > div:nth-of-type(1) > a", "html > body > div:nth-of-type(1)"));
        assert!(is_descendant("html > body > x-banner >>> button", "html > body > x-banner"));
        assert!(!is_descendant("html > body > div:nth-of-type(12)", "html > body > div:nth-of-type(1)"));
        assert!(!is_descendant("html > body", "html > body"));
    }

    #[test]
    fn outermost_clickable_wins() {
        let nodes = vec![
            node("html > body > div:nth-of-type(1)", true, true),
            node("html > body > div:nth-of-type(1) > span:nth-of-type(1)", true, true),
            node("html > body > div:nth-of-type(2)", true, true),
        ];
        let kept = select_maximal(nodes);
        let locators: Vec<&str> = kept.iter().map(|n| n.locator.as_str()).collect();
        assert_eq!(locators, vec!["html > body > div:nth-of-type(1)", "html > body > div:nth-of-type(2)"]);
    }

    #[test]
    fn hidden_or_inert_nodes_are_not_clickable() {
        assert!(!is_clickable(&node("a", false, true)));
        assert!(!is_clickable(&node("a", true, false)));
        let mut pointer = node("a", true, false);
        pointer.pointer_cursor = true;
        assert!(is_clickable(&pointer));
    }
}
