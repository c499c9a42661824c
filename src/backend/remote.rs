//! Remote fetch service adapter
//!
//! The service exposes three JSON endpoints:
//!
//! | Endpoint          | Purpose                              |
//! |-------------------|--------------------------------------|
//! | `POST /fetch`     | fetch and extract a page             |
//! | `POST /fetch-raw` | fetch a resource without processing  |
//! | `GET /health`     | liveness and current concurrency     |

use super::extract::extract_page;
use super::{
    endpoint, transport_error, BackendHealth, BackendRequest, FetchBackend, PageContent,
    RawContent,
};
use crate::strategy::Strategy;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    referer: Option<&'a str>,
    timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ServicePage {
    final_url: Option<String>,
    title: Option<String>,
    content: Option<String>,
    text_content: Option<String>,
    status_code: Option<u16>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ServiceRaw {
    final_url: Option<String>,
    body: Option<String>,
    content_type: Option<String>,
    status_code: Option<u16>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ServiceHealth {
    status: Option<String>,
    concurrency: Option<u64>,
    available: Option<bool>,
}

/// Client for the remote fetch service
#[derive(Debug, Clone)]
pub struct RemoteServiceBackend {
    client: Client,
    base: Url,
}

impl RemoteServiceBackend {
    pub fn new(client: Client, base_url: &str) -> Result<Self, FetchError> {
        let base = Url::parse(base_url).map_err(|e| {
            FetchError::Config(crate::ConfigError::InvalidUrl(format!(
                "remote backend url '{}': {}",
                base_url, e
            )))
        })?;

        Ok(Self { client, base })
    }

    fn body<'a>(&self, request: &'a BackendRequest) -> ServiceRequest<'a> {
        let mut headers = request.headers.clone();
        if let Some(cookie) = &request.cookie {
            headers.insert("Cookie".to_string(), cookie.clone());
        }

        ServiceRequest {
            url: request.url.as_str(),
            headers,
            referer: request.referer.as_deref(),
            timeout_ms: request.timeout.as_millis() as u64,
        }
    }

    async fn post<T>(&self, path: &str, request: &BackendRequest) -> Result<T, FetchError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(endpoint(&self.base, path)?)
            .timeout(request.timeout)
            .json(&self.body(request))
            .send()
            .await
            .map_err(|e| transport_error(Strategy::Remote, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                backend: Strategy::Remote,
                status: status.as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| transport_error(Strategy::Remote, e))
    }
}

fn service_error(error: Option<String>) -> Option<FetchError> {
    error
        .filter(|message| !message.trim().is_empty())
        .map(|message| FetchError::Transport {
            backend: Strategy::Remote,
            message,
        })
}

#[async_trait]
impl FetchBackend for RemoteServiceBackend {
    fn strategy(&self) -> Strategy {
        Strategy::Remote
    }

    async fn fetch_page(&self, request: &BackendRequest) -> Result<PageContent, FetchError> {
        let page: ServicePage = self.post("fetch", request).await?;

        if let Some(err) = service_error(page.error) {
            return Err(err);
        }
        if let Some(status) = page.status_code.filter(|s| *s >= 400) {
            return Err(FetchError::HttpStatus {
                backend: Strategy::Remote,
                status,
            });
        }

        let html = page.content.unwrap_or_default();

        // The service may skip extraction for some content types
        let (title, text) = match page.text_content {
            Some(text) => (page.title, text),
            None => {
                let extracted = extract_page(&html);
                (page.title.or(extracted.title), extracted.text)
            }
        };

        Ok(PageContent {
            final_url: page
                .final_url
                .unwrap_or_else(|| request.url.to_string()),
            title: title.filter(|t| !t.trim().is_empty()),
            html,
            text,
            status: page.status_code,
        })
    }

    async fn fetch_raw(&self, request: &BackendRequest) -> Result<RawContent, FetchError> {
        let raw: ServiceRaw = self.post("fetch-raw", request).await?;

        if let Some(err) = service_error(raw.error) {
            return Err(err);
        }

        let status = raw.status_code.unwrap_or(200);
        if status >= 400 {
            return Err(FetchError::HttpStatus {
                backend: Strategy::Remote,
                status,
            });
        }

        Ok(RawContent {
            final_url: raw.final_url.unwrap_or_else(|| request.url.to_string()),
            body: raw.body.unwrap_or_default(),
            content_type: raw.content_type,
            status,
        })
    }

    async fn health(&self) -> Result<BackendHealth, FetchError> {
        let response = self
            .client
            .get(endpoint(&self.base, "health")?)
            .send()
            .await
            .map_err(|e| transport_error(Strategy::Remote, e))?;

        if !response.status().is_success() {
            return Ok(BackendHealth {
                strategy: Strategy::Remote,
                available: false,
                status: format!("HTTP {}", response.status().as_u16()),
                running: None,
            });
        }

        let health: ServiceHealth = response
            .json()
            .await
            .map_err(|e| transport_error(Strategy::Remote, e))?;
        let status = health.status.unwrap_or_else(|| "ok".to_string());

        Ok(BackendHealth {
            strategy: Strategy::Remote,
            available: health.available.unwrap_or(status == "ok"),
            status,
            running: health.concurrency,
        })
    }
}
