use crate::config::DiscoveryConfig;
use crate::url::extract_domain;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Decides which discovered links are worth enqueueing
#[derive(Debug, Clone)]
pub struct LinkFilter {
    seed_domain: String,
    same_domain: bool,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    path_prefix: Option<String>,
}

impl LinkFilter {
    /// Compiles the discovery patterns for a crawl rooted at `seed_domain`
    pub fn new(config: &DiscoveryConfig, seed_domain: &str) -> Result<Self, ConfigError> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>, ConfigError> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        ConfigError::InvalidPattern(format!("Invalid discovery pattern '{}': {}", p, e))
                    })
                })
                .collect()
        };

        Ok(Self {
            seed_domain: seed_domain.to_string(),
            same_domain: config.same_domain,
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
            path_prefix: config.path_prefix.clone(),
        })
    }

    /// Whether `url` passes the domain, prefix, include and exclude filters
    pub fn accepts(&self, url: &Url) -> bool {
        if self.same_domain && extract_domain(url).as_deref() != Some(self.seed_domain.as_str()) {
            return false;
        }

        if let Some(prefix) = &self.path_prefix {
            if !url.path().starts_with(prefix.as_str()) {
                return false;
            }
        }

        let candidate = url.as_str();
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(candidate)) {
            return false;
        }

        !self.exclude.iter().any(|re| re.is_match(candidate))
    }
}
