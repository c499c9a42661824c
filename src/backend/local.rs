//! Direct in-process fetching
//!
//! Always available and the last resort of every escalation plan. Follows
//! redirects itself and extracts content with the shared extractor.

use super::extract::extract_page;
use super::{transport_error, BackendHealth, BackendRequest, FetchBackend, PageContent, RawContent};
use crate::config::UserAgentConfig;
use crate::strategy::Strategy;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE, REFERER};
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;

/// Maximum redirect hops before the request fails
const MAX_REDIRECTS: usize = 10;

/// Builds the shared HTTP client with the configured user agent
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Client used by every backend
/// * `Err(FetchError::Client)` - The TLS stack could not be initialized
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, FetchError> {
    let client = Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Fetches pages straight from the origin
#[derive(Debug, Clone)]
pub struct LocalBackend {
    client: Client,
}

impl LocalBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: &BackendRequest) -> Result<Response, FetchError> {
        let mut builder = self
            .client
            .get(request.url.clone())
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer.as_str());
        }
        if let Some(cookie) = &request.cookie {
            builder = builder.header(COOKIE, cookie.as_str());
        }

        builder
            .send()
            .await
            .map_err(|e| transport_error(Strategy::Local, e))
    }
}

#[async_trait]
impl FetchBackend for LocalBackend {
    fn strategy(&self) -> Strategy {
        Strategy::Local
    }

    async fn fetch_page(&self, request: &BackendRequest) -> Result<PageContent, FetchError> {
        let response = self.send(request).await?;
        let status = response.status();

        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::HttpStatus {
                backend: Strategy::Local,
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| transport_error(Strategy::Local, e))?;

        let extracted = extract_page(&html);
        tracing::trace!(
            "Local fetch of {} returned {} bytes",
            final_url,
            html.len()
        );

        Ok(PageContent {
            final_url,
            title: extracted.title,
            html,
            text: extracted.text,
            status: Some(status.as_u16()),
        })
    }

    async fn fetch_raw(&self, request: &BackendRequest) -> Result<RawContent, FetchError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();

        if status >= 400 {
            return Err(FetchError::HttpStatus {
                backend: Strategy::Local,
                status,
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Strategy::Local, e))?;

        Ok(RawContent {
            final_url,
            body,
            content_type,
            status,
        })
    }

    async fn health(&self) -> Result<BackendHealth, FetchError> {
        Ok(BackendHealth {
            strategy: Strategy::Local,
            available: true,
            status: "ok".to_string(),
            running: None,
        })
    }
}
