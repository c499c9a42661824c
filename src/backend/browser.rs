//! Headless-browser rendering service adapter
//!
//! Sends the page to `POST /content`, which navigates a real browser and
//! returns the rendered DOM as HTML. Extraction happens locally.

use super::extract::extract_page;
use super::{
    endpoint, transport_error, BackendHealth, BackendRequest, FetchBackend, PageContent,
    RawContent,
};
use crate::config::BrowserBackendConfig;
use crate::strategy::Strategy;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use url::Url;

/// Script run after load to trigger lazy-loaded content
const SCROLL_SCRIPT: &str = "async () => { \
    for (let i = 0; i < 10; i++) { window.scrollBy(0, window.innerHeight); \
    await new Promise(r => setTimeout(r, 250)); } window.scrollTo(0, 0); }";

#[derive(Debug, Serialize)]
struct BrowserCookie {
    name: String,
    value: String,
    domain: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PressureResponse {
    pressure: Option<Pressure>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Pressure {
    is_available: Option<bool>,
    running: Option<u64>,
    reason: Option<String>,
}

/// Client for the headless-browser rendering service
#[derive(Debug, Clone)]
pub struct BrowserRenderBackend {
    client: Client,
    base: Url,
    token: Option<String>,
    viewport: (u32, u32),
    wait_until: String,
}

impl BrowserRenderBackend {
    pub fn from_config(client: Client, config: &BrowserBackendConfig) -> Result<Self, FetchError> {
        let base = Url::parse(&config.url).map_err(|e| {
            FetchError::Config(crate::ConfigError::InvalidUrl(format!(
                "browser backend url '{}': {}",
                config.url, e
            )))
        })?;

        Ok(Self {
            client,
            base,
            token: config.token.clone(),
            viewport: (config.viewport_width, config.viewport_height),
            wait_until: config.wait_until.clone(),
        })
    }

    fn with_token(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.query(&[("token", token.as_str())]),
            None => builder,
        }
    }

    fn payload(&self, request: &BackendRequest) -> serde_json::Value {
        let mut headers: BTreeMap<String, String> = request.headers.clone();
        if let Some(referer) = &request.referer {
            headers.insert("Referer".to_string(), referer.clone());
        }

        let mut payload = json!({
            "url": request.url.as_str(),
            "gotoOptions": {
                "waitUntil": self.wait_until,
                "timeout": request.timeout.as_millis() as u64,
            },
            "viewport": {
                "width": self.viewport.0,
                "height": self.viewport.1,
            },
        });

        if !headers.is_empty() {
            payload["setExtraHTTPHeaders"] = json!(headers);
        }

        if let Some(cookie) = &request.cookie {
            let cookies = parse_cookie_header(cookie, request.url.host_str().unwrap_or_default());
            if !cookies.is_empty() {
                payload["cookies"] = json!(cookies);
            }
        }

        if request.needs_scroll {
            payload["addScriptTag"] = json!([{ "content": format!("({})()", SCROLL_SCRIPT) }]);
            payload["waitForTimeout"] = json!(3000);
        }

        payload
    }

    async fn render(&self, request: &BackendRequest) -> Result<(String, Option<String>), FetchError> {
        let builder = self
            .client
            .post(endpoint(&self.base, "content")?)
            .timeout(request.timeout)
            .json(&self.payload(request));

        let response = self
            .with_token(builder)
            .send()
            .await
            .map_err(|e| transport_error(Strategy::Browser, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(FetchError::RenderBackend {
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status.as_u16(), detail.trim()),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let html = response
            .text()
            .await
            .map_err(|e| transport_error(Strategy::Browser, e))?;

        Ok((html, content_type))
    }
}

/// Splits a raw `Cookie` header into browser cookie objects
fn parse_cookie_header(header: &str, host: &str) -> Vec<BrowserCookie> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(BrowserCookie {
                name: name.to_string(),
                value: value.trim().to_string(),
                domain: host.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl FetchBackend for BrowserRenderBackend {
    fn strategy(&self) -> Strategy {
        Strategy::Browser
    }

    async fn fetch_page(&self, request: &BackendRequest) -> Result<PageContent, FetchError> {
        let (html, _) = self.render(request).await?;
        let extracted = extract_page(&html);

        Ok(PageContent {
            final_url: request.url.to_string(),
            title: extracted.title,
            html,
            text: extracted.text,
            status: None,
        })
    }

    async fn fetch_raw(&self, request: &BackendRequest) -> Result<RawContent, FetchError> {
        let (body, content_type) = self.render(request).await?;

        Ok(RawContent {
            final_url: request.url.to_string(),
            body,
            content_type: content_type.or_else(|| Some("text/html".to_string())),
            status: 200,
        })
    }

    async fn health(&self) -> Result<BackendHealth, FetchError> {
        let builder = self.client.get(endpoint(&self.base, "pressure")?);
        let response = self
            .with_token(builder)
            .send()
            .await
            .map_err(|e| transport_error(Strategy::Browser, e))?;

        if !response.status().is_success() {
            return Ok(BackendHealth {
                strategy: Strategy::Browser,
                available: false,
                status: format!("HTTP {}", response.status().as_u16()),
                running: None,
            });
        }

        let pressure = response
            .json::<PressureResponse>()
            .await
            .map_err(|e| transport_error(Strategy::Browser, e))?
            .pressure
            .unwrap_or_default();
        let available = pressure.is_available.unwrap_or(true);

        Ok(BackendHealth {
            strategy: Strategy::Browser,
            available,
            status: pressure
                .reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| if available { "ok" } else { "busy" }.to_string()),
            running: pressure.running,
        })
    }
}
