//! Retrieval backends
//!
//! Three interchangeable adapters behind one [`FetchBackend`] contract:
//! - [`RemoteServiceBackend`]: remote high-throughput fetch service
//! - [`BrowserRenderBackend`]: headless-browser rendering service
//! - [`LocalBackend`]: direct fetch from this process
//!
//! Adapters only talk to the network. Admission control, fallback and
//! quality checks belong to the orchestrator.

mod browser;
pub mod extract;
mod local;
mod remote;

pub use browser::BrowserRenderBackend;
pub use local::{build_http_client, LocalBackend};
pub use remote::RemoteServiceBackend;

use crate::config::Config;
use crate::strategy::Strategy;
use crate::FetchError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A single backend request, fully prepared by the orchestrator
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub url: Url,
    /// Extra headers from the matching domain rule
    pub headers: BTreeMap<String, String>,
    pub referer: Option<String>,
    /// Raw `Cookie` header value from the credential provider
    pub cookie: Option<String>,
    pub timeout: Duration,
    pub needs_scroll: bool,
}

impl BackendRequest {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            headers: BTreeMap::new(),
            referer: None,
            cookie: None,
            timeout,
            needs_scroll: false,
        }
    }
}

/// A fetched and extracted page
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub final_url: String,
    pub title: Option<String>,
    pub html: String,
    pub text: String,
    /// Upstream status, when the backend exposes it
    pub status: Option<u16>,
}

impl PageContent {
    /// Whether the backend returned anything at all
    pub fn is_empty(&self) -> bool {
        self.html.trim().is_empty() && self.text.trim().is_empty()
    }
}

/// An unprocessed transport response
#[derive(Debug, Clone)]
pub struct RawContent {
    pub final_url: String,
    pub body: String,
    pub content_type: Option<String>,
    pub status: u16,
}

impl RawContent {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"))
    }
}

/// Self-reported backend health
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub strategy: Strategy,
    pub available: bool,
    pub status: String,
    /// In-flight work reported by the service, if any
    pub running: Option<u64>,
}

/// The contract every retrieval backend implements
///
/// Errors must be one of `FetchError::Transport`, `FetchError::HttpStatus`
/// or `FetchError::RenderBackend` so the orchestrator can report them as
/// site failures.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Fetch a page and extract its title and text
    async fn fetch_page(&self, request: &BackendRequest) -> Result<PageContent, FetchError>;

    /// Fetch the transport body verbatim
    async fn fetch_raw(&self, request: &BackendRequest) -> Result<RawContent, FetchError>;

    async fn health(&self) -> Result<BackendHealth, FetchError>;
}

/// The configured backends, one optional slot per [`Strategy`]
#[derive(Clone, Default)]
pub struct BackendSet {
    remote: Option<Arc<dyn FetchBackend>>,
    browser: Option<Arc<dyn FetchBackend>>,
    local: Option<Arc<dyn FetchBackend>>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every backend the config names; local is always present
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let client = build_http_client(&config.user_agent)?;
        let mut set = Self::new().with_local(Arc::new(LocalBackend::new(client.clone())));

        if let Some(remote) = &config.backends.remote {
            set = set.with_remote(Arc::new(RemoteServiceBackend::new(
                client.clone(),
                &remote.url,
            )?));
        }

        if let Some(browser) = &config.backends.browser {
            set = set.with_browser(Arc::new(BrowserRenderBackend::from_config(
                client, browser,
            )?));
        }

        Ok(set)
    }

    pub fn with_remote(mut self, backend: Arc<dyn FetchBackend>) -> Self {
        self.remote = Some(backend);
        self
    }

    pub fn with_browser(mut self, backend: Arc<dyn FetchBackend>) -> Self {
        self.browser = Some(backend);
        self
    }

    pub fn with_local(mut self, backend: Arc<dyn FetchBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    /// The single dispatch point from strategy to adapter
    pub fn get(&self, strategy: Strategy) -> Option<&Arc<dyn FetchBackend>> {
        match strategy {
            Strategy::Remote => self.remote.as_ref(),
            Strategy::Browser => self.browser.as_ref(),
            Strategy::Local => self.local.as_ref(),
        }
    }

    pub fn is_available(&self, strategy: Strategy) -> bool {
        self.get(strategy).is_some()
    }

    /// Configured backends in priority order
    pub fn available(&self) -> Vec<Strategy> {
        Strategy::PRIORITY
            .into_iter()
            .filter(|s| self.is_available(*s))
            .collect()
    }
}

/// Maps a `reqwest` failure to a transport error for the given backend
pub(crate) fn transport_error(backend: Strategy, err: reqwest::Error) -> FetchError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    };

    FetchError::Transport { backend, message }
}

/// Joins a service base URL and an endpoint path
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, FetchError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    base.join(path.trim_start_matches('/')).map_err(|e| {
        FetchError::Config(crate::ConfigError::InvalidUrl(format!(
            "cannot join {} onto {}: {}",
            path, base, e
        )))
    })
}
