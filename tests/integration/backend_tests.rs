use ripple_fetch::backend::{
    BackendRequest, BrowserRenderBackend, FetchBackend, LocalBackend, RemoteServiceBackend,
};
use ripple_fetch::config::BrowserBackendConfig;
use ripple_fetch::strategy::Strategy;
use ripple_fetch::FetchError;
use serde_json::json;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(url: &str) -> BackendRequest {
    BackendRequest::new(Url::parse(url).unwrap(), Duration::from_secs(5))
}

fn browser_backend(uri: &str) -> BrowserRenderBackend {
    BrowserRenderBackend::from_config(
        reqwest::Client::new(),
        &BrowserBackendConfig {
            url: uri.to_string(),
            token: Some("secret".to_string()),
            viewport_width: 1280,
            viewport_height: 720,
            wait_until: "networkidle2".to_string(),
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_remote_sends_cookie_in_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fetch"))
        .and(body_partial_json(json!({
            "url": "https://paywall.example.com/story",
            "headers": { "Cookie": "sid=abc" },
            "timeoutMs": 5000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "finalUrl": "https://paywall.example.com/story?ref=1",
            "title": "Subscriber story",
            "content": "<html><body><p>Body text</p></body></html>"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RemoteServiceBackend::new(reqwest::Client::new(), &server.uri()).unwrap();
    let mut req = request("https://paywall.example.com/story");
    req.cookie = Some("sid=abc".to_string());

    let page = backend.fetch_page(&req).await.unwrap();

    assert_eq!(page.final_url, "https://paywall.example.com/story?ref=1");
    assert_eq!(page.title.as_deref(), Some("Subscriber story"));
    // No textContent in the reply, so text is extracted from the HTML
    assert!(page.text.contains("Body text"));
}

#[tokio::test]
async fn test_remote_reported_error_is_transport_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fetch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "upstream connection reset"
        })))
        .mount(&server)
        .await;

    let backend = RemoteServiceBackend::new(reqwest::Client::new(), &server.uri()).unwrap();
    let err = backend
        .fetch_page(&request("https://flaky.example.com/"))
        .await
        .unwrap_err();

    assert!(err.is_site_failure());
    assert!(matches!(
        err,
        FetchError::Transport { backend: Strategy::Remote, ref message } if message.contains("reset")
    ));
}

#[tokio::test]
async fn test_remote_upstream_status_is_http_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fetch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "",
            "statusCode": 429
        })))
        .mount(&server)
        .await;

    let backend = RemoteServiceBackend::new(reqwest::Client::new(), &server.uri()).unwrap();
    let err = backend
        .fetch_page(&request("https://busy.example.com/"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(429));
}

#[tokio::test]
async fn test_remote_health() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "concurrency": 7
        })))
        .mount(&server)
        .await;

    let backend = RemoteServiceBackend::new(reqwest::Client::new(), &server.uri()).unwrap();
    let health = backend.health().await.unwrap();

    assert!(health.available);
    assert_eq!(health.strategy, Strategy::Remote);
    assert_eq!(health.running, Some(7));
}

#[tokio::test]
async fn test_remote_health_down() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let backend = RemoteServiceBackend::new(reqwest::Client::new(), &server.uri()).unwrap();
    let health = backend.health().await.unwrap();

    assert!(!health.available);
    assert_eq!(health.status, "HTTP 503");
}

#[tokio::test]
async fn test_browser_render_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content"))
        .and(query_param("token", "secret"))
        .and(body_partial_json(json!({
            "url": "https://app.example.com/dashboard",
            "gotoOptions": { "waitUntil": "networkidle2", "timeout": 5000 },
            "viewport": { "width": 1280, "height": 720 },
            "cookies": [{ "name": "sid", "value": "abc", "domain": "app.example.com" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Dashboard</title></head><body><main>Rendered</main></body></html>",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let backend = browser_backend(&server.uri());
    let mut req = request("https://app.example.com/dashboard");
    req.cookie = Some("sid=abc".to_string());

    let page = backend.fetch_page(&req).await.unwrap();

    assert_eq!(page.title.as_deref(), Some("Dashboard"));
    assert!(page.text.contains("Rendered"));
    assert_eq!(page.final_url, "https://app.example.com/dashboard");
}

#[tokio::test]
async fn test_browser_error_status_is_render_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too many sessions"))
        .mount(&server)
        .await;

    let backend = browser_backend(&server.uri());
    let err = backend
        .fetch_page(&request("https://app.example.com/"))
        .await
        .unwrap_err();

    assert!(err.is_site_failure());
    assert_eq!(err.status(), Some(429));
    assert!(err.to_string().contains("HTTP 429: Too many sessions"));
}

#[tokio::test]
async fn test_browser_pressure_health() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pressure"))
        .and(query_param("token", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pressure": { "isAvailable": false, "running": 10, "reason": "full" }
        })))
        .mount(&server)
        .await;

    let health = browser_backend(&server.uri()).health().await.unwrap();

    assert!(!health.available);
    assert_eq!(health.status, "full");
    assert_eq!(health.running, Some(10));
}

#[tokio::test]
async fn test_local_sends_rule_headers_and_referer() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("x-env", "test"))
        .and(header("referer", "https://search.example.org/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><head><title>Plain page</title></head><body>Hi</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = LocalBackend::new(reqwest::Client::new());
    let mut req = request(&format!("{}/page", server.uri()));
    req.headers.insert("X-Env".to_string(), "test".to_string());
    req.referer = Some("https://search.example.org/".to_string());

    let page = backend.fetch_page(&req).await.unwrap();

    assert_eq!(page.status, Some(200));
    assert_eq!(page.title.as_deref(), Some("Plain page"));
}

#[tokio::test]
async fn test_local_raw_keeps_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"items\":[]}", "application/json"),
        )
        .mount(&server)
        .await;

    let backend = LocalBackend::new(reqwest::Client::new());
    let raw = backend
        .fetch_raw(&request(&format!("{}/data.json", server.uri())))
        .await
        .unwrap();

    assert_eq!(raw.body, "{\"items\":[]}");
    assert_eq!(raw.content_type.as_deref(), Some("application/json"));
    assert!(!raw.is_html());
}
