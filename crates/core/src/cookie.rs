use crate::model::Role;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
    #[default]
    Unspecified,
}

/// A cookie as reported by the browser's cookie jar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Expiry as seconds since the epoch; `None` for session cookies
    pub expires: Option<f64>,
    pub http_only: bool,
    pub secure: bool,
    pub session: bool,
    pub same_site: SameSite,
}

impl BrowserCookie {
    pub fn key(&self) -> String {
        cookie_key(&self.name, &self.domain, &self.path)
    }

    /// Cookies whose domain carries no leading dot are only sent to the exact host.
    pub fn host_only(&self) -> bool {
        !self.domain.starts_with('.')
    }
}

pub fn normalize_domain(domain: &str) -> &str {
    domain.strip_prefix('.').unwrap_or(domain)
}

/// Unique record key: `name;normalizedDomain;path`
pub fn cookie_key(name: &str, domain: &str, path: &str) -> String {
    format!("{};{};{}", name, normalize_domain(domain), path)
}

/// Category index produced by the cookie classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CookieCategory {
    Necessary,
    Functional,
    Analytics,
    Advertising,
    Unclassified,
}

impl CookieCategory {
    pub fn from_label(label: i32) -> Self {
        match label {
            0 => CookieCategory::Necessary,
            1 => CookieCategory::Functional,
            2 => CookieCategory::Analytics,
            3 => CookieCategory::Advertising,
            _ => CookieCategory::Unclassified,
        }
    }

    pub fn requires_consent(self) -> bool {
        matches!(
            self,
            CookieCategory::Functional | CookieCategory::Analytics | CookieCategory::Advertising
        )
    }
}

/// Variable part of a cookie at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieSnapshot {
    pub host_only: bool,
    pub http_only: bool,
    pub secure: bool,
    pub session: bool,
    /// Seconds until expiry relative to `timestamp`; 0 for session cookies
    pub expiry: i64,
    pub value: String,
    pub same_site: SameSite,
    /// Observation time in milliseconds since the epoch
    pub timestamp: i64,
}

impl CookieSnapshot {
    pub fn observe(cookie: &BrowserCookie, now_ms: i64) -> Self {
        let expiry = match cookie.expires {
            Some(expires) if !cookie.session && expires > 0.0 => {
                (expires - now_ms as f64 / 1000.0).round() as i64
            }
            _ => 0,
        };
        Self {
            host_only: cookie.host_only(),
            http_only: cookie.http_only,
            secure: cookie.secure,
            session: cookie.session,
            expiry,
            value: cookie.value.clone(),
            same_site: cookie.same_site,
            timestamp: now_ms,
        }
    }
}

pub const UNCLASSIFIED: i32 = -1;

/// Rolling history of one cookie key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub domain: String,
    pub path: String,
    pub current_label: i32,
    pub label_timestamp: i64,
    pub variable_data: VecDeque<CookieSnapshot>,
}

impl CookieRecord {
    pub fn new(cookie: &BrowserCookie) -> Self {
        Self {
            name: cookie.name.clone(),
            domain: normalize_domain(&cookie.domain).to_string(),
            path: cookie.path.clone(),
            current_label: UNCLASSIFIED,
            label_timestamp: 0,
            variable_data: VecDeque::new(),
        }
    }

    pub fn key(&self) -> String {
        cookie_key(&self.name, &self.domain, &self.path)
    }

    pub fn is_classified(&self) -> bool {
        self.current_label != UNCLASSIFIED
    }

    /// Appends a snapshot, evicting the oldest ones once `cap` is reached.
    pub fn push_snapshot(&mut self, snapshot: CookieSnapshot, cap: usize) {
        while self.variable_data.len() >= cap.max(1) {
            self.variable_data.pop_front();
        }
        self.variable_data.push_back(snapshot);
    }

    pub fn features(&self) -> CookieFeatures {
        CookieFeatures {
            name: self.name.clone(),
            domain: self.domain.clone(),
            path: self.path.clone(),
            history: self.variable_data.iter().cloned().collect(),
        }
    }
}

/// Input handed to the cookie classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieFeatures {
    pub name: String,
    pub domain: String,
    pub path: String,
    pub history: Vec<CookieSnapshot>,
}

/// A cookie as seen under one interaction branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedCookie {
    pub key: String,
    pub name: String,
    pub domain: String,
    pub label: i32,
}

impl ObservedCookie {
    pub fn from_record(record: &CookieRecord) -> Self {
        Self {
            key: record.key(),
            name: record.name.clone(),
            domain: record.domain.clone(),
            label: record.current_label,
        }
    }

    pub fn category(&self) -> CookieCategory {
        CookieCategory::from_label(self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// Consent-requiring cookie present before any choice was made
    SetBeforeConsent,
    /// Consent-requiring cookie present after a refusing choice
    IgnoredChoice { role: Role },
    /// Consent-requiring cookie set on a site that shows no notice
    SetWithoutNotice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieViolation {
    #[serde(flatten)]
    pub kind: ViolationKind,
    pub key: String,
    pub category: CookieCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie(domain: &str) -> BrowserCookie {
        BrowserCookie {
            name: "_ga".into(),
            value: "GA1.1.1".into(),
            domain: domain.into(),
            path: "/".into(),
            expires: Some(1_700_000_100.0),
            http_only: false,
            secure: true,
            session: false,
            same_site: SameSite::Lax,
        }
    }

    #[test]
    fn key_normalizes_leading_dot() {
        assert_eq!(cookie(".example.com").key(), "_ga;example.com;/");
        assert_eq!(cookie("example.com").key(), "_ga;example.com;/");
        assert!(!cookie(".example.com").host_only());
        assert!(cookie("example.com").host_only());
    }

    #[test]
    fn snapshot_expiry_is_relative() {
        let snap = CookieSnapshot::observe(&cookie("example.com"), 1_700_000_000_000);
        assert_eq!(snap.expiry, 100);
        assert_eq!(snap.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn history_is_fifo_bounded() {
        let c = cookie("example.com");
        let mut record = CookieRecord::new(&c);
        for ts in 0..11 {
            record.push_snapshot(CookieSnapshot::observe(&c, ts), 10);
        }
        assert_eq!(record.variable_data.len(), 10);
        assert_eq!(record.variable_data.front().map(|s| s.timestamp), Some(1));
        assert_eq!(record.variable_data.back().map(|s| s.timestamp), Some(10));
    }
}
