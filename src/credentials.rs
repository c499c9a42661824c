//! Per-domain credential lookup
//!
//! The orchestrator only needs two synchronous questions answered: "is there
//! a cookie for this URL?" and "is this URL useless without one?". Where the
//! answers come from is up to the implementation.

use crate::config::CredentialEntry;
use crate::url::{extract_domain, DomainTable};
use url::Url;

/// Source of per-domain cookies
pub trait CredentialProvider: Send + Sync {
    /// Raw `Cookie` header value for the URL's domain, if any
    fn cookie_for_url(&self, url: &Url) -> Option<String>;

    /// Whether the domain serves nothing useful without credentials
    fn requires_auth(&self, url: &Url) -> bool;
}

/// Provider that never has credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn cookie_for_url(&self, _url: &Url) -> Option<String> {
        None
    }

    fn requires_auth(&self, _url: &Url) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
struct StoredCredential {
    cookie: Option<String>,
    requires_auth: bool,
}

/// Provider backed by the `[[credential]]` config entries
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: DomainTable<StoredCredential>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[CredentialEntry]) -> Self {
        let mut credentials = Self::new();
        for entry in entries {
            credentials.insert(&entry.domain, entry.cookie.clone(), entry.requires_auth);
        }
        credentials
    }

    /// Adds a domain pattern; blank cookies are treated as absent
    pub fn insert(&mut self, pattern: &str, cookie: Option<String>, requires_auth: bool) {
        self.entries.insert(
            pattern,
            StoredCredential {
                cookie: cookie.filter(|c| !c.trim().is_empty()),
                requires_auth,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, url: &Url) -> Option<&StoredCredential> {
        let domain = extract_domain(url)?;
        self.entries.lookup(&domain)
    }
}

impl CredentialProvider for StaticCredentials {
    fn cookie_for_url(&self, url: &Url) -> Option<String> {
        self.lookup(url).and_then(|c| c.cookie.clone())
    }

    fn requires_auth(&self, url: &Url) -> bool {
        self.lookup(url).is_some_and(|c| c.requires_auth)
    }
}
