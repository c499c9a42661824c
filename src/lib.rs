//! Ripple-Fetch: a domain-aware fetch orchestrator
//!
//! This crate decides, for every outbound request, whether it is safe to send
//! now, which retrieval backend should serve it, and what to do when a backend
//! fails or returns low-quality content. Admission control lives in
//! [`scheduler::DomainScheduler`], backend selection in [`strategy`], and the
//! fallback loop in [`orchestrator::Orchestrator`].

pub mod backend;
pub mod config;
pub mod crawler;
pub mod credentials;
pub mod orchestrator;
pub mod output;
pub mod scheduler;
pub mod state;
pub mod strategy;
pub mod url;

use strategy::Strategy;
use thiserror::Error;

/// Main error type for Ripple-Fetch operations
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Circuit open for {domain}, retry in {retry_after_ms}ms")]
    CircuitOpen { domain: String, retry_after_ms: u64 },

    #[error("Timed out after {waited_ms}ms waiting for a permit on {domain}")]
    AdmissionTimeout { domain: String, waited_ms: u64 },

    #[error("{backend} transport error: {message}")]
    Transport { backend: Strategy, message: String },

    #[error("{backend} backend returned HTTP {status}")]
    HttpStatus { backend: Strategy, status: u16 },

    #[error("Render backend error: {message}")]
    RenderBackend {
        /// Status returned by the render service, when it answered at all
        status: Option<u16>,
        message: String,
    },

    #[error("No {0} backend configured")]
    BackendUnavailable(Strategy),

    #[error("All strategies exhausted for {url}: {}", .attempts.join("; "))]
    AllStrategiesExhausted { url: String, attempts: Vec<String> },

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Scheduler-level refusals: no backend was attempted and nothing is
    /// reported back to the scheduler.
    pub fn is_admission(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::AdmissionTimeout { .. })
    }

    /// Failures that say something about the remote site's current tolerance.
    pub fn is_site_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::HttpStatus { .. } | Self::RenderBackend { .. }
        )
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RenderBackend { status, .. } => *status,
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Ripple-Fetch operations
pub type Result<T> = std::result::Result<T, FetchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use orchestrator::{FetchOptions, FetchResult, Orchestrator, RawResult};
pub use scheduler::{CircuitBreakerConfig, DomainPermit, DomainScheduler};
pub use state::DomainState;
pub use strategy::{QualityEvaluator, StrategyRules};
