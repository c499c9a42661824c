use crate::common::{article_html, backends_toml, config_with, orchestrator};
use ripple_fetch::strategy::Strategy;
use ripple_fetch::FetchOptions;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_unrendered_shell_escalates_to_browser() {
    let remote = MockServer::start().await;
    let browser = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fetch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "finalUrl": "https://spa.example.com/story",
            "title": "News",
            "content": "<div id=\"app\"></div>",
            "textContent": "Loading the app",
            "images": [],
            "strategy": "go",
            "durationMs": 12
        })))
        .expect(1)
        .mount(&remote)
        .await;

    Mock::given(method("POST"))
        .and(path("/content"))
        .and(query_param("token", "secret"))
        .and(body_partial_json(json!({ "url": "https://spa.example.com/story" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("Budget approved"))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&browser)
        .await;

    let config = config_with(&backends_toml(Some(&remote.uri()), Some(&browser.uri())));
    let orchestrator = orchestrator(&config);

    let result = orchestrator
        .fetch("https://spa.example.com/story", &FetchOptions::new())
        .await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.strategy_used, Some(Strategy::Browser));
    assert!(result.escalated);
    assert_eq!(result.title.as_deref(), Some("Budget approved"));
    assert!(result.text_len() >= 200);
    assert_eq!(result.attempted, vec![Strategy::Remote, Strategy::Browser]);
}

#[tokio::test]
async fn test_remote_failure_falls_back_to_local() {
    let remote = MockServer::start().await;
    let origin = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fetch"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&remote)
        .await;

    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("Local copy"))
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&origin)
        .await;

    let config = config_with(&backends_toml(Some(&remote.uri()), None));
    let orchestrator = orchestrator(&config);

    let url = format!("{}/article", origin.uri());
    let result = orchestrator.fetch(&url, &FetchOptions::new()).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.strategy_used, Some(Strategy::Local));
    assert_eq!(result.attempted, vec![Strategy::Remote, Strategy::Local]);
    assert_eq!(result.title.as_deref(), Some("Local copy"));

    let stats = orchestrator.scheduler().domain_stats("127.0.0.1").unwrap();
    assert_eq!(stats.total_failures, 1);
    assert_eq!(stats.fail_count, 0);
    assert_eq!(stats.active_requests, 0);
}

#[tokio::test]
async fn test_remote_request_carries_referer_and_rule_headers() {
    let remote = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fetch"))
        .and(body_partial_json(json!({
            "url": "https://news.example.com/a",
            "referer": "https://search.example.org/",
            "headers": { "Accept-Language": "de-DE" },
            "timeoutMs": 5000
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "finalUrl": "https://news.example.com/a",
            "title": "Haushalt beschlossen",
            "content": article_html("Haushalt beschlossen"),
            "textContent": "Der Stadtrat hat den Haushalt beschlossen. ".repeat(10),
            "strategy": "go",
            "durationMs": 40
        })))
        .expect(1)
        .mount(&remote)
        .await;

    let extra = format!(
        "{}\n[[rule]]\ndomain = \"*.example.com\"\nstrategy = \"go\"\nheaders = {{ \"Accept-Language\" = \"de-DE\" }}\n",
        backends_toml(Some(&remote.uri()), None)
    );
    let orchestrator = orchestrator(&config_with(&extra));

    let options = FetchOptions::new().with_referer("https://search.example.org/");
    let result = orchestrator.fetch("https://news.example.com/a", &options).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.strategy_used, Some(Strategy::Remote));
    assert!(!result.escalated);
}

#[tokio::test]
async fn test_forbidden_with_credential_flags_expiry() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/members"))
        .and(header("cookie", "sid=stale"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&origin)
        .await;

    let config = config_with(
        "[[credential]]\ndomain = \"127.0.0.1\"\ncookie = \"sid=stale\"\nrequires-auth = true\n",
    );
    let orchestrator = orchestrator(&config);

    let url = format!("{}/members", origin.uri());
    let result = orchestrator.fetch(&url, &FetchOptions::new()).await;

    assert!(!result.success);
    assert!(result.authenticated);
    assert!(result.credential_likely_expired);
    assert!(result.error.unwrap().contains("403"));
}

#[tokio::test]
async fn test_browser_forbidden_with_credential_flags_expiry() {
    let browser = MockServer::start().await;
    let origin = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/content"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden by origin"))
        .expect(1)
        .mount(&browser)
        .await;

    Mock::given(method("GET"))
        .and(path("/members"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&origin)
        .await;

    let extra = format!(
        "{}\n[[rule]]\ndomain = \"127.0.0.1\"\nstrategy = \"browser\"\n\n[[credential]]\ndomain = \"127.0.0.1\"\ncookie = \"sid=stale\"\n",
        backends_toml(None, Some(&browser.uri()))
    );
    let orchestrator = orchestrator(&config_with(&extra));

    let url = format!("{}/members", origin.uri());
    let result = orchestrator.fetch(&url, &FetchOptions::new()).await;

    assert!(!result.success);
    assert_eq!(result.attempted, vec![Strategy::Browser, Strategy::Local]);
    // Only the render service answered 401/403; the origin's 500 is not an auth rejection
    assert!(result.credential_likely_expired);
}

#[tokio::test]
async fn test_repeated_failures_open_circuit() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&origin)
        .await;

    let orchestrator = orchestrator(&config_with(""));
    let url = format!("{}/down", origin.uri());

    for _ in 0..3 {
        let result = orchestrator.fetch(&url, &FetchOptions::new()).await;
        assert!(!result.success);
    }
    assert!(orchestrator.scheduler().is_circuit_open("127.0.0.1"));

    // No request reaches the origin while the circuit is open
    let result = orchestrator.fetch(&url, &FetchOptions::new()).await;
    assert!(!result.success);
    assert!(result.attempted.is_empty());
    assert!(result.error.unwrap().contains("Circuit open"));

    assert!(orchestrator.scheduler().reset("127.0.0.1"));
    assert!(!orchestrator.scheduler().is_circuit_open("127.0.0.1"));
}

#[tokio::test]
async fn test_fetch_raw_via_remote() {
    let remote = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/fetch-raw"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "finalUrl": "https://feeds.example.com/rss",
            "body": "<rss version=\"2.0\"><channel></channel></rss>",
            "contentType": "application/rss+xml",
            "statusCode": 200
        })))
        .expect(1)
        .mount(&remote)
        .await;

    let orchestrator = orchestrator(&config_with(&backends_toml(Some(&remote.uri()), None)));

    let raw = orchestrator
        .fetch_raw("https://feeds.example.com/rss", &FetchOptions::new())
        .await
        .unwrap();

    assert_eq!(raw.strategy_used, Strategy::Remote);
    assert_eq!(raw.status_code, 200);
    assert_eq!(raw.content_type.as_deref(), Some("application/rss+xml"));
    assert!(raw.body.starts_with("<rss"));
    assert!(!raw.escalated);
}

#[tokio::test]
async fn test_fetch_raw_exhausted() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&origin)
        .await;

    let orchestrator = orchestrator(&config_with(""));
    let url = format!("{}/gone", origin.uri());

    let err = orchestrator
        .fetch_raw(&url, &FetchOptions::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("All strategies exhausted"));
}

#[tokio::test]
async fn test_batch_over_one_origin() {
    let origin = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(article_html("Batch item"))
                .insert_header("content-type", "text/html"),
        )
        .expect(5)
        .mount(&origin)
        .await;

    let orchestrator = orchestrator(&config_with(
        "[[domain-limit]]\ndomain = \"127.0.0.1\"\nmax-concurrent = 2\n",
    ));
    let urls: Vec<String> = (0..5).map(|i| format!("{}/item/{}", origin.uri(), i)).collect();

    let results = orchestrator.fetch_batch(&urls, &FetchOptions::new()).await;

    assert_eq!(results.len(), 5);
    for (url, result) in urls.iter().zip(&results) {
        assert_eq!(&result.url, url);
        assert!(result.success, "error: {:?}", result.error);
    }

    let stats = orchestrator.scheduler().domain_stats("127.0.0.1").unwrap();
    assert_eq!(stats.max_concurrent, 2);
    assert_eq!(stats.total_permits, 5);
    assert_eq!(stats.active_requests, 0);
}
