use super::Strategy;
use crate::config::Config;
use crate::url::{domain_of, normalize_host, DomainTable};
use std::collections::BTreeMap;

/// A per-domain backend preference
#[derive(Debug, Clone, PartialEq)]
pub struct DomainRule {
    /// Exact hostname or `*.suffix` wildcard
    pub pattern: String,
    pub strategy: Strategy,
    /// Whether the page lazy-loads content and must be scrolled when rendered
    pub needs_scroll: bool,
    /// Extra request headers sent to every backend
    pub headers: BTreeMap<String, String>,
}

impl DomainRule {
    pub fn new(pattern: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            pattern: pattern.into(),
            strategy,
            needs_scroll: false,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_scroll(mut self) -> Self {
        self.needs_scroll = true;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// The outcome of resolving a domain against the rule table
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStrategy {
    pub strategy: Strategy,
    pub needs_scroll: bool,
    pub headers: BTreeMap<String, String>,
    /// Pattern of the matching rule; `None` when the global default applied
    pub matched: Option<String>,
}

/// Domain-to-backend rule table
///
/// Immutable after construction. Lookups try exact patterns, then wildcards
/// in declaration order; unmatched domains get the global default.
#[derive(Debug, Clone)]
pub struct StrategyRules {
    rules: DomainTable<DomainRule>,
    default: Strategy,
}

impl StrategyRules {
    pub fn new(default: Strategy, rules: impl IntoIterator<Item = DomainRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|rule| (rule.pattern.clone(), rule))
                .collect(),
            default,
        }
    }

    /// Builds the rule table from `[strategy]` and `[[rule]]` config sections
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.strategy.default,
            config.rules.iter().map(|entry| DomainRule {
                pattern: entry.domain.clone(),
                strategy: entry.strategy,
                needs_scroll: entry.needs_scroll,
                headers: entry.headers.clone(),
            }),
        )
    }

    pub fn default_strategy(&self) -> Strategy {
        self.default
    }

    /// Finds the rule for a hostname (normalized here)
    pub fn rule_for(&self, host: &str) -> Option<&DomainRule> {
        self.rules.lookup(&normalize_host(host))
    }

    /// Resolves the full rule outcome for a hostname
    pub fn resolve_domain(&self, host: &str) -> ResolvedStrategy {
        match self.rule_for(host) {
            Some(rule) => ResolvedStrategy {
                strategy: rule.strategy,
                needs_scroll: rule.needs_scroll,
                headers: rule.headers.clone(),
                matched: Some(rule.pattern.clone()),
            },
            None => ResolvedStrategy {
                strategy: self.default,
                needs_scroll: false,
                headers: BTreeMap::new(),
                matched: None,
            },
        }
    }

    /// Picks the initial backend for a URL
    ///
    /// Unparseable URLs resolve to the global default; the orchestrator
    /// rejects them before any backend is chosen anyway.
    pub fn resolve_strategy(&self, url: &str) -> Strategy {
        match domain_of(url) {
            Ok((_, domain)) => self.resolve_domain(&domain).strategy,
            Err(_) => self.default,
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainRule> {
        self.rules.iter().map(|(_, rule)| rule)
    }
}

impl Default for StrategyRules {
    fn default() -> Self {
        Self::new(Strategy::Remote, Vec::new())
    }
}
