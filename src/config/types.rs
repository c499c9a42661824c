use crate::strategy::Strategy;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Ripple-Fetch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(rename = "circuit-breaker", default)]
    pub circuit_breaker: CircuitBreakerSettings,
    #[serde(rename = "domain-limit", default)]
    pub domain_limits: Vec<DomainLimitEntry>,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(rename = "rule", default)]
    pub rules: Vec<RuleEntry>,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(rename = "credential", default)]
    pub credentials: Vec<CredentialEntry>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Default per-domain limits for domains without a `[[domain-limit]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum in-flight requests per domain
    #[serde(rename = "default-max-concurrent", default = "default_max_concurrent")]
    pub default_max_concurrent: u32,

    /// Requests per second per domain (fractional values allowed)
    #[serde(rename = "default-rps", default = "default_rps")]
    pub default_rps: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent: default_max_concurrent(),
            default_rps: default_rps(),
        }
    }
}

/// Failure handling thresholds, all durations in milliseconds
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerSettings {
    #[serde(rename = "fail-threshold", default = "default_fail_threshold")]
    pub fail_threshold: u32,

    #[serde(rename = "open-duration-ms", default = "default_open_duration_ms")]
    pub open_duration_ms: u64,

    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(rename = "max-admission-wait-ms", default = "default_max_admission_wait_ms")]
    pub max_admission_wait_ms: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            fail_threshold: default_fail_threshold(),
            open_duration_ms: default_open_duration_ms(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_admission_wait_ms: default_max_admission_wait_ms(),
        }
    }
}

/// Static per-domain limit override
#[derive(Debug, Clone, Deserialize)]
pub struct DomainLimitEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,

    #[serde(rename = "max-concurrent")]
    pub max_concurrent: Option<u32>,

    pub rps: Option<f64>,
}

/// Strategy selection and content-quality thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Backend used for domains without a matching rule
    #[serde(default = "default_strategy")]
    pub default: Strategy,

    /// Minimum trimmed text length for a result to count as usable
    #[serde(rename = "min-text-length", default = "default_min_text_length")]
    pub min_text_length: usize,

    /// Minimum title length for a result to count as usable
    #[serde(rename = "min-title-length", default = "default_min_title_length")]
    pub min_title_length: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            default: default_strategy(),
            min_text_length: default_min_text_length(),
            min_title_length: default_min_title_length(),
        }
    }
}

/// A domain rule entry
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,

    pub strategy: Strategy,

    #[serde(rename = "needs-scroll", default)]
    pub needs_scroll: bool,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Backend endpoints; the local backend is always present
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendsConfig {
    pub remote: Option<RemoteBackendConfig>,
    pub browser: Option<BrowserBackendConfig>,
}

/// Remote high-throughput fetch service
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteBackendConfig {
    /// Base URL, e.g. "http://localhost:8080"
    pub url: String,
}

/// Headless-browser rendering service
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserBackendConfig {
    /// Base URL, e.g. "http://localhost:3000"
    pub url: String,

    /// Access token appended as `?token=`
    pub token: Option<String>,

    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Navigation wait condition passed to the renderer
    #[serde(rename = "wait-until", default = "default_wait_until")]
    pub wait_until: String,
}

/// Per-request defaults
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Backend request timeout (milliseconds)
    #[serde(rename = "timeout-ms", default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Cookie credential for a domain pattern
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    pub domain: String,

    /// Raw `Cookie` header value
    pub cookie: Option<String>,

    /// Whether the domain serves nothing useful without a cookie
    #[serde(rename = "requires-auth", default)]
    pub requires_auth: bool,
}

/// Crawl discovery bounds and filters
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    #[serde(rename = "max-urls", default = "default_max_urls")]
    pub max_urls: usize,

    #[serde(rename = "same-domain", default = "default_true")]
    pub same_domain: bool,

    /// Regular expressions; when non-empty a link must match one of them
    #[serde(default)]
    pub include: Vec<String>,

    /// Regular expressions; a link matching any of them is dropped
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(rename = "path-prefix")]
    pub path_prefix: Option<String>,

    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_urls: default_max_urls(),
            same_domain: true,
            include: Vec::new(),
            exclude: Vec::new(),
            path_prefix: None,
            respect_robots: true,
        }
    }
}

fn default_max_concurrent() -> u32 {
    2
}

fn default_rps() -> f64 {
    1.0
}

fn default_fail_threshold() -> u32 {
    5
}

fn default_open_duration_ms() -> u64 {
    300_000
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_max_admission_wait_ms() -> u64 {
    30_000
}

fn default_strategy() -> Strategy {
    Strategy::Remote
}

fn default_min_text_length() -> usize {
    200
}

fn default_min_title_length() -> usize {
    3
}

fn default_viewport_width() -> u32 {
    1366
}

fn default_viewport_height() -> u32 {
    900
}

fn default_wait_until() -> String {
    "networkidle2".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_urls() -> usize {
    200
}

fn default_true() -> bool {
    true
}
