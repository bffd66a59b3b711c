use consentry_core::{AuditError, Dimensions, PageDriver};
use serde::{Deserialize, Serialize};

/// Visible text multiset plus client size of a subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub texts: Vec<String>,
    pub dimensions: Dimensions,
}

impl Footprint {
    pub fn new(texts: Vec<String>, dimensions: Dimensions) -> Self {
        Self { texts, dimensions }
    }

    /// Equal iff same fragment count, same dimensions, and the sorted fragments match.
    pub fn equivalent(&self, other: &Footprint) -> bool {
        if self.texts.len() != other.texts.len() || self.dimensions != other.dimensions {
            return false;
        }
        let mut left: Vec<&str> = self.texts.iter().map(String::as_str).collect();
        let mut right: Vec<&str> = other.texts.iter().map(String::as_str).collect();
        left.sort_unstable();
        right.sort_unstable();
        left == right
    }
}

pub async fn footprint_of(page: &dyn PageDriver, root: &str) -> Result<Option<Footprint>, AuditError> {
    Ok(page
        .footprint_data(root)
        .await?
        .map(|(texts, dimensions)| Footprint::new(texts, dimensions)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(texts: &[&str], width: u32, height: u32) -> Footprint {
        Footprint::new(texts.iter().map(|s| s.to_string()).collect(), Dimensions { width, height })
    }

    #[test]
    fn reflexive() {
        let a = fp(&["We use cookies", "Accept", "Reject"], 800, 200);
        assert!(a.equivalent(&a));
        assert!(fp(&[], 0, 0).equivalent(&fp(&[], 0, 0)));
    }

    #[test]
    fn ignores_fragment_order() {
        let a = fp(&["We use cookies", "Accept", "Reject"], 800, 200);
        let b = fp(&["Reject", "We use cookies", "Accept"], 800, 200);
        assert!(a.equivalent(&b));
        assert!(b.equivalent(&a));
    }

    #[test]
    fn differs_on_size_count_or_content() {
        let a = fp(&["Accept", "Reject"], 800, 200);
        assert!(!a.equivalent(&fp(&["Accept", "Reject"], 800, 420)));
        assert!(!a.equivalent(&fp(&["Accept", "Reject", "Save"], 800, 200)));
        assert!(!a.equivalent(&fp(&["Accept", "Save"], 800, 200)));
        // multiset, not set
        assert!(!fp(&["A", "A", "B"], 1, 1).equivalent(&fp(&["A", "B", "B"], 1, 1)));
    }
}
