use crate::second_level::needs_second_level;
use consentry_core::{ElementsByRole, InteractiveElement, Role};

/// Roles executed during page interaction, in execution order
pub const EXECUTION_ORDER: [Role; 4] = [Role::Accept, Role::Reject, Role::Close, Role::SaveSettings];

/// Labeled elements of both levels and the choices derived from them
#[derive(Debug, Clone, Default)]
pub struct InteractionPlan {
    pub first_level: ElementsByRole,
    pub second_level: ElementsByRole,
}

impl InteractionPlan {
    pub fn new(first_level: ElementsByRole) -> Self {
        Self {
            first_level,
            second_level: ElementsByRole::default(),
        }
    }

    pub fn with_second_level(mut self, second_level: ElementsByRole) -> Self {
        self.second_level = second_level;
        self
    }

    pub fn needs_second_level(&self) -> bool {
        needs_second_level(&self.first_level)
    }

    pub fn has(&self, role: Role) -> bool {
        self.first_level.has(role) || self.second_level.has(role)
    }

    pub fn reject_detected(&self) -> bool {
        self.has(Role::Reject)
    }

    pub fn close_save_detected(&self) -> bool {
        self.has(Role::Close) || self.has(Role::SaveSettings)
    }

    /// One element per executable role: a first-level element when there is one,
    /// otherwise the first one found behind a second-level anchor.
    pub fn elements(&self) -> Vec<InteractiveElement> {
        EXECUTION_ORDER
            .iter()
            .filter_map(|&role| {
                self.first_level
                    .first_single(role)
                    .or_else(|| self.second_level.get(role).first())
                    .cloned()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentry_core::Point;

    fn el(locator: &str, role: Role) -> InteractiveElement {
        InteractiveElement::first_level(locator, locator, "button", Point::default()).with_role(role)
    }

    #[test]
    fn accept_and_reject_need_no_second_level() {
        let plan = InteractionPlan::new(ElementsByRole::from_labeled(vec![
            el("accept", Role::Accept),
            el("reject", Role::Reject),
        ]));
        assert!(!plan.needs_second_level());
        let elements = plan.elements();
        let order: Vec<&str> = elements.iter().map(|e| e.last_locator()).collect();
        assert_eq!(order, vec!["accept", "reject"]);
    }

    #[test]
    fn second_level_fills_missing_roles() {
        let anchor = el("settings", Role::Settings);
        let reject = InteractiveElement::nested(&anchor, &el("reject-all", Role::Reject)).unwrap();
        let accept_inner = InteractiveElement::nested(&anchor, &el("accept-inner", Role::Accept)).unwrap();
        let plan = InteractionPlan::new(ElementsByRole::from_labeled(vec![el("accept", Role::Accept), anchor]))
            .with_second_level(ElementsByRole::from_labeled(vec![accept_inner, reject]));

        let elements = plan.elements();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].depth(), 1);
        assert_eq!(elements[0].last_locator(), "accept");
        assert_eq!(elements[1].locator_path, vec!["settings", "reject-all"]);
        assert!(plan.reject_detected());
        assert!(!plan.close_save_detected());
    }
}
