use crate::strategy::Strategy;
use serde::Serialize;
use std::time::Duration;

/// Per-call options for [`Orchestrator::fetch`](super::Orchestrator::fetch)
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Backend request timeout; defaults to `[fetch] timeout-ms`
    pub timeout: Option<Duration>,
    /// Sent as the `Referer` header
    pub referer: Option<String>,
    /// Start from this backend instead of the rule table's choice
    pub forced_strategy: Option<Strategy>,
    /// Do not look up or send credentials
    pub skip_credentials: bool,
    /// Ceiling on each permit wait; defaults to the breaker's `max_admission_wait`
    pub admission_wait: Option<Duration>,
    /// A 404 or 410 answer is not held against the domain
    pub missing_ok: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.forced_strategy = Some(strategy);
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_credentials(mut self) -> Self {
        self.skip_credentials = true;
        self
    }

    /// For optional resources such as robots.txt
    pub fn allow_missing(mut self) -> Self {
        self.missing_ok = true;
        self
    }
}

/// Outcome of a page fetch
///
/// Failures are reported here rather than as an `Err`: `success` is false
/// and `error` carries a human-readable message.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub success: bool,
    /// The URL as requested
    pub url: String,
    /// URL after redirects; equals `url` when nothing was fetched
    pub final_url: String,
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    pub text_content: Option<String>,
    /// Backend whose result was returned
    pub strategy_used: Option<Strategy>,
    pub duration_ms: u64,
    /// A credential was attached to the request
    pub authenticated: bool,
    /// A backend answered 401/403 although a credential was sent
    pub credential_likely_expired: bool,
    /// The returned result came from a quality-driven escalation
    pub escalated: bool,
    /// Backends tried, in order
    pub attempted: Vec<Strategy>,
    pub error: Option<String>,
}

impl FetchResult {
    /// An empty failed result for `url`
    pub(crate) fn pending(url: &str) -> Self {
        Self {
            success: false,
            url: url.to_string(),
            final_url: url.to_string(),
            title: None,
            html_content: None,
            text_content: None,
            strategy_used: None,
            duration_ms: 0,
            authenticated: false,
            credential_likely_expired: false,
            escalated: false,
            attempted: Vec::new(),
            error: None,
        }
    }

    /// Length of the extracted text, 0 when absent
    pub fn text_len(&self) -> usize {
        self.text_content
            .as_deref()
            .map_or(0, |t| t.chars().count())
    }
}

/// Outcome of a raw fetch: the transport body, unprocessed
#[derive(Debug, Clone, Serialize)]
pub struct RawResult {
    pub final_url: String,
    pub body: String,
    pub content_type: Option<String>,
    pub status_code: u16,
    pub strategy_used: Strategy,
    pub duration_ms: u64,
    pub authenticated: bool,
    pub credential_likely_expired: bool,
    pub escalated: bool,
}
