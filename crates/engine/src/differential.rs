use consentry_core::{CookieBuckets, CookieViolation, ObservedCookie, Role, ViolationKind};
use std::collections::HashSet;

/// Roles whose branch expresses a refusal or a restricted choice
const REFUSING: [Role; 3] = [Role::Reject, Role::Close, Role::SaveSettings];

fn violation(kind: ViolationKind, cookie: &ObservedCookie) -> CookieViolation {
    CookieViolation {
        kind,
        key: cookie.key.clone(),
        category: cookie.category(),
    }
}

/// Compares cookie buckets across branches.
///
/// With a notice, consent-requiring cookies in the untouched baseline were set
/// before consent, and new ones after a refusing branch ignored the choice.
/// Without a notice every consent-requiring cookie was set without notice.
pub fn analyze(buckets: &CookieBuckets, notice_detected: bool) -> Vec<CookieViolation> {
    if !notice_detected {
        return dedup(
            buckets
                .no_notice
                .iter()
                .filter(|c| c.category().requires_consent())
                .map(|c| violation(ViolationKind::SetWithoutNotice, c))
                .collect(),
        );
    }

    let mut violations: Vec<CookieViolation> = buckets
        .baseline
        .iter()
        .filter(|c| c.category().requires_consent())
        .map(|c| violation(ViolationKind::SetBeforeConsent, c))
        .collect();

    let baseline: HashSet<&str> = buckets.baseline.iter().map(|c| c.key.as_str()).collect();
    for branch in buckets.branches.iter().filter(|b| b.succeeded && REFUSING.contains(&b.role)) {
        violations.extend(
            branch
                .cookies
                .iter()
                .filter(|c| c.category().requires_consent() && !baseline.contains(c.key.as_str()))
                .map(|c| violation(ViolationKind::IgnoredChoice { role: branch.role }, c)),
        );
    }
    dedup(violations)
}

/// Cookies that only appear once the visitor accepts.
pub fn accepted_only(buckets: &CookieBuckets) -> Vec<ObservedCookie> {
    let mut seen: HashSet<&str> = buckets.baseline.iter().map(|c| c.key.as_str()).collect();
    for branch in buckets.branches.iter().filter(|b| b.role != Role::Accept) {
        seen.extend(branch.cookies.iter().map(|c| c.key.as_str()));
    }
    buckets
        .branches
        .iter()
        .filter(|b| b.succeeded && b.role == Role::Accept)
        .flat_map(|b| b.cookies.iter())
        .filter(|c| !seen.contains(c.key.as_str()))
        .cloned()
        .collect()
}

fn dedup(violations: Vec<CookieViolation>) -> Vec<CookieViolation> {
    let mut out: Vec<CookieViolation> = Vec::with_capacity(violations.len());
    for v in violations {
        if !out.iter().any(|o| o.key == v.key && o.kind == v.kind) {
            out.push(v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use consentry_core::{BranchOutcome, InteractiveElement, Point};

    fn seen(name: &str, label: i32) -> ObservedCookie {
        ObservedCookie {
            key: format!("{};shop.example;/", name),
            name: name.to_string(),
            domain: "shop.example".to_string(),
            label,
        }
    }

    fn branch(role: Role, cookies: Vec<ObservedCookie>) -> BranchOutcome {
        BranchOutcome {
            role,
            element: InteractiveElement::first_level("b", "b", "button", Point::default()).with_role(role),
            succeeded: true,
            cookies,
            visited_pages: Vec::new(),
        }
    }

    #[test]
    fn flags_baseline_and_ignored_refusal() {
        let buckets = CookieBuckets {
            baseline: vec![seen("session", 0), seen("_fbp", 3)],
            no_notice: Vec::new(),
            branches: vec![
                branch(Role::Accept, vec![seen("session", 0), seen("_fbp", 3), seen("_ga", 2)]),
                branch(Role::Reject, vec![seen("session", 0), seen("_fbp", 3), seen("_gid", 2)]),
            ],
        };
        let violations = analyze(&buckets, true);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].kind, ViolationKind::SetBeforeConsent);
        assert_eq!(violations[0].key, "_fbp;shop.example;/");
        assert_eq!(violations[1].kind, ViolationKind::IgnoredChoice { role: Role::Reject });
        assert_eq!(violations[1].key, "_gid;shop.example;/");

        let declared = accepted_only(&buckets);
        assert_eq!(declared.len(), 1);
        assert_eq!(declared[0].name, "_ga");
    }

    #[test]
    fn no_notice_flags_consent_cookies_only() {
        let buckets = CookieBuckets {
            no_notice: vec![seen("session", 0), seen("_ga", 2), seen("_ga", 2), seen("mystery", -1)],
            ..Default::default()
        };
        let violations = analyze(&buckets, false);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::SetWithoutNotice);
    }
}
