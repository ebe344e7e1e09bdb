//! In-memory credential bags keyed by wildcard domain pattern.
//!
//! Keys are normalized to `*.<base>`; a lookup for any host under `<base>`
//! (or `<base>` itself) finds the bag. Nothing is persisted.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::Serialize;

pub type SecretFields = BTreeMap<String, String>;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no credentials stored for {0}")]
    NotFound(String),

    #[error("invalid domain: {0:?}")]
    InvalidDomain(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CredentialSummary {
    pub pattern: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMatch {
    pub pattern: String,
    pub fields: SecretFields,
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    // Insertion-ordered; a handful of entries at most.
    records: RwLock<Vec<(String, SecretFields)>>,
}

/// Drop a leading `http://` / `https://` and anything after the host.
pub fn strip_scheme(domain: &str) -> String {
    let trimmed = domain.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Canonical stored form: scheme stripped, lowercased, `*.` prefixed.
pub fn normalize_pattern(domain: &str) -> Result<String, CredentialError> {
    let host = strip_scheme(domain);
    let base = host.strip_prefix("*.").unwrap_or(&host);
    if base.is_empty() || base.contains('*') {
        return Err(CredentialError::InvalidDomain(domain.to_string()));
    }
    Ok(format!("*.{base}"))
}

fn pattern_base(pattern: &str) -> &str {
    pattern.strip_prefix("*.").unwrap_or(pattern)
}

fn wildcard_matches(base: &str, host: &str) -> bool {
    host == base
        || host
            .strip_suffix(base)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the bag for `domain`. Returns the stored pattern.
    pub fn add(&self, domain: &str, fields: SecretFields) -> Result<String, CredentialError> {
        let pattern = normalize_pattern(domain)?;
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        match records.iter_mut().find(|(p, _)| *p == pattern) {
            Some((_, existing)) => *existing = fields,
            None => records.push((pattern.clone(), fields)),
        }
        tracing::info!(pattern = %pattern, "stored credentials");
        Ok(pattern)
    }

    /// Find the bag that applies to `domain`.
    ///
    /// An exact pattern hit wins. Otherwise the wildcard with the longest
    /// matching base is chosen, earlier insertions winning equal lengths.
    pub fn lookup(&self, domain: &str) -> Result<CredentialMatch, CredentialError> {
        let host = strip_scheme(domain);
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());

        let exact = records
            .iter()
            .find(|(pattern, _)| *pattern == host || pattern_base(pattern) == host);

        let found = exact.or_else(|| {
            records
                .iter()
                .filter(|(pattern, _)| wildcard_matches(pattern_base(pattern), &host))
                .fold(None, |best: Option<&(String, SecretFields)>, candidate| match best {
                    Some(b) if pattern_base(&b.0).len() >= pattern_base(&candidate.0).len() => {
                        Some(b)
                    }
                    _ => Some(candidate),
                })
        });

        found
            .map(|(pattern, fields)| CredentialMatch {
                pattern: pattern.clone(),
                fields: fields.clone(),
            })
            .ok_or(CredentialError::NotFound(host))
    }

    pub fn remove(&self, domain: &str) -> Result<String, CredentialError> {
        let pattern = normalize_pattern(domain)?;
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        records.retain(|(p, _)| *p != pattern);
        if records.len() == before {
            return Err(CredentialError::NotFound(pattern));
        }
        tracing::info!(pattern = %pattern, "removed credentials");
        Ok(pattern)
    }

    /// Stored patterns with their field names; values are never listed.
    pub fn list(&self) -> Vec<CredentialSummary> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .map(|(pattern, fields)| CredentialSummary {
                pattern: pattern.clone(),
                fields: fields.keys().cloned().collect(),
            })
            .collect()
    }

    /// Field names stored for `domain`, for prompt placeholders.
    pub fn placeholders(&self, domain: &str) -> Vec<String> {
        self.lookup(domain)
            .map(|m| m.fields.into_keys().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> SecretFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn normalize_adds_wildcard_and_strips_scheme() {
        assert_eq!(normalize_pattern("example.com").unwrap(), "*.example.com");
        assert_eq!(normalize_pattern("https://Example.com/login").unwrap(), "*.example.com");
        assert_eq!(normalize_pattern("*.example.com").unwrap(), "*.example.com");
        assert_eq!(normalize_pattern("http://*.shop.io").unwrap(), "*.shop.io");
    }

    #[test]
    fn normalize_rejects_empty() {
        assert!(matches!(
            normalize_pattern("https://"),
            Err(CredentialError::InvalidDomain(_))
        ));
        assert!(normalize_pattern("*.").is_err());
    }

    #[test]
    fn subdomain_and_base_lookup() {
        let store = CredentialStore::new();
        store.add("example.com", fields(&[("u", "a")])).unwrap();

        assert_eq!(store.lookup("www.example.com").unwrap().fields, fields(&[("u", "a")]));
        assert_eq!(store.lookup("example.com").unwrap().fields, fields(&[("u", "a")]));
        assert_eq!(
            store.lookup("https://app.example.com/path").unwrap().pattern,
            "*.example.com"
        );
        assert_eq!(
            store.lookup("other.com"),
            Err(CredentialError::NotFound("other.com".into()))
        );
    }

    #[test]
    fn suffix_match_is_dot_bounded() {
        let store = CredentialStore::new();
        store.add("example.com", fields(&[("u", "a")])).unwrap();
        assert!(store.lookup("notexample.com").is_err());
    }

    #[test]
    fn last_write_wins() {
        let store = CredentialStore::new();
        store.add("example.com", fields(&[("u", "a")])).unwrap();
        store.add("https://example.com", fields(&[("u", "b")])).unwrap();
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.lookup("example.com").unwrap().fields, fields(&[("u", "b")]));
    }

    #[test]
    fn most_specific_wildcard_wins() {
        let store = CredentialStore::new();
        store.add("example.com", fields(&[("who", "root")])).unwrap();
        store.add("shop.example.com", fields(&[("who", "shop")])).unwrap();

        let hit = store.lookup("cart.shop.example.com").unwrap();
        assert_eq!(hit.pattern, "*.shop.example.com");
        let hit = store.lookup("blog.example.com").unwrap();
        assert_eq!(hit.pattern, "*.example.com");
    }

    #[test]
    fn remove_then_not_found() {
        let store = CredentialStore::new();
        store.add("example.com", fields(&[("u", "a")])).unwrap();
        assert_eq!(store.remove("https://example.com").unwrap(), "*.example.com");
        assert!(store.lookup("www.example.com").is_err());
        assert_eq!(
            store.remove("example.com"),
            Err(CredentialError::NotFound("*.example.com".into()))
        );
    }

    #[test]
    fn lookup_is_idempotent() {
        let store = CredentialStore::new();
        store.add("a.com", fields(&[("k", "1")])).unwrap();
        store.add("b.com", fields(&[("k", "2")])).unwrap();
        let first = store.lookup("x.b.com");
        for _ in 0..5 {
            assert_eq!(store.lookup("x.b.com"), first);
        }
        assert_eq!(store.lookup("zzz.com"), store.lookup("zzz.com"));
    }

    #[test]
    fn list_and_placeholders_never_expose_values() {
        let store = CredentialStore::new();
        store
            .add("example.com", fields(&[("username", "alice"), ("password", "hunter2")]))
            .unwrap();

        let listed = store.list();
        assert_eq!(listed[0].pattern, "*.example.com");
        assert_eq!(listed[0].fields, vec!["password", "username"]);
        assert_eq!(store.placeholders("www.example.com"), vec!["password", "username"]);
        assert!(store.placeholders("nope.org").is_empty());
    }
}
