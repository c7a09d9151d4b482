//! Domain suffix matching
//!
//! Rule domains are stored normalized with a leading `.`. A destination
//! `d` matches the rule domain `.x` when `d` is `x` itself or ends with
//! `.x`, so `.example.com` covers `example.com` and `a.example.com` but
//! not `notexample.com`. Comparison is ASCII case-insensitive.
//!
//! # Example
//!
//! ```
//! use proxy_gateway::rules::domain::{matches_suffix, normalize_suffix};
//!
//! let suffix = normalize_suffix("example.com");
//! assert_eq!(suffix, ".example.com");
//! assert!(matches_suffix("example.com", &suffix));
//! assert!(matches_suffix("mail.example.com", &suffix));
//! assert!(!matches_suffix("notexample.com", &suffix));
//! ```

/// Normalize a configured rule domain to its `.x` form
#[must_use]
pub fn normalize_suffix(domain: &str) -> String {
    let domain = domain.trim();
    if domain.starts_with('.') {
        domain.to_string()
    } else {
        format!(".{domain}")
    }
}

/// Check `domain` against a normalized suffix (`.x`)
#[must_use]
pub fn matches_suffix(domain: &str, suffix: &str) -> bool {
    let domain = domain.as_bytes();
    let suffix = suffix.as_bytes();
    let Some(bare) = suffix.strip_prefix(b".") else {
        return false;
    };

    if domain.len() == bare.len() {
        return domain.eq_ignore_ascii_case(bare);
    }

    domain.len() > suffix.len() && domain[domain.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Normalized suffix list of one routing rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    suffixes: Vec<String>,
}

impl DomainSet {
    /// Build from configured domains, normalizing each entry
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            suffixes: domains
                .into_iter()
                .map(|d| normalize_suffix(d.as_ref()))
                .collect(),
        }
    }

    /// Whether any suffix matches `domain`
    #[must_use]
    pub fn matches(&self, domain: &str) -> bool {
        self.suffixes.iter().any(|s| matches_suffix(domain, s))
    }

    /// Normalized suffixes in configuration order
    #[must_use]
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Number of suffixes
    #[must_use]
    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    /// Whether the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }
}
