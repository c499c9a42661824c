use super::normalize_host;

/// Checks if a domain matches a wildcard pattern
///
/// Two pattern forms are supported:
/// 1. Exact: `"example.com"` matches only `"example.com"`
/// 2. Wildcard: `"*.example.com"` matches the bare `"example.com"` and any
///    subdomain at any depth (`"blog.example.com"`, `"a.b.example.com"`)
///
/// Both sides are expected to be normalized already (see
/// [`normalize_host`](super::normalize_host)); the comparison is case-sensitive.
///
/// # Examples
///
/// ```
/// use ripple_fetch::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || (candidate.len() > base.len()
                    && candidate.ends_with(base)
                    && candidate.as_bytes()[candidate.len() - base.len() - 1] == b'.')
        }
        None => candidate == pattern,
    }
}

/// Brings a pattern into the same form as looked-up hosts
///
/// The host part goes through [`normalize_host`], so `www.example.com`
/// becomes `example.com` and `*.WWW.Example.com` becomes `*.example.com`.
pub fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.trim();
    match pattern.strip_prefix("*.") {
        Some(base) => format!("*.{}", normalize_host(base)),
        None => normalize_host(pattern),
    }
}

/// An ordered table of domain patterns mapped to values
///
/// Lookups check exact patterns first, then wildcard patterns in insertion
/// order; the first match wins. Used for strategy rules, static per-domain
/// limits and credentials. Patterns are normalized on the way in.
#[derive(Debug, Clone)]
pub struct DomainTable<T> {
    entries: Vec<(String, T)>,
}

impl<T> DomainTable<T> {
    /// Creates an empty table
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a pattern; earlier entries take precedence on ties
    pub fn insert(&mut self, pattern: impl Into<String>, value: T) {
        self.entries.push((normalize_pattern(&pattern.into()), value));
    }

    /// Finds the value for a normalized domain
    pub fn lookup(&self, domain: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(pattern, _)| !pattern.starts_with("*.") && pattern == domain)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(pattern, _)| pattern.starts_with("*.") && matches_wildcard(pattern, domain))
            })
            .map(|(_, value)| value)
    }

    /// Number of patterns in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no patterns
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(pattern, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(p, v)| (p.as_str(), v))
    }
}

impl<T> Default for DomainTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(String, T)> for DomainTable<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(pattern, value)| (normalize_pattern(&pattern), value))
                .collect(),
        }
    }
}
