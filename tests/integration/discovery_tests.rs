use crate::common::{config_with, orchestrator};
use ripple_fetch::config::DiscoveryConfig;
use ripple_fetch::crawler::Discovery;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_page(links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{}\">link</a>", href))
        .collect();

    ResponseTemplate::new(200)
        .set_body_raw(
            format!(
                "<html><head><title>Page</title></head><body>{}</body></html>",
                anchors
            ),
            "text/html",
        )
}

async fn mount_page(server: &MockServer, route: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(links))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discovery_respects_robots_and_depth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /private\nCrawl-delay: 0.005\n")
                .insert_header("content-type", "text/plain"),
        )
        .expect(1)
        .mount(&server)
        .await;

    mount_page(
        &server,
        "/",
        &["/a", "/b#comments", "/private/secret", "https://other.org/x"],
    )
    .await;
    mount_page(&server, "/a", &["/c"]).await;
    mount_page(&server, "/b", &["/a"]).await;

    let config = DiscoveryConfig {
        max_depth: 1,
        ..DiscoveryConfig::default()
    };
    let orchestrator = orchestrator(&config_with(""));
    let mut discovery = Discovery::new(orchestrator.clone(), config, "TestBot");

    let report = discovery.run(&format!("{}/", server.uri())).await.unwrap();

    let visited: Vec<&str> = report.visited.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(visited.len(), 3, "visited: {:?}", visited);
    assert!(report.visited.iter().all(|p| p.depth <= 1));
    assert_eq!(report.visited[0].new_links, 3);

    // Seed, /a, /b and the disallowed /private/secret; /c sits past max depth
    assert_eq!(report.discovered.len(), 4);
    assert!(!report.discovered.iter().any(|u| u.ends_with("/c")));
    assert!(!report.discovered.iter().any(|u| u.contains("other.org")));

    assert_eq!(report.disallowed_by_robots, 1);
    assert_eq!(report.depth_reached, 1);
    assert!(report.failed.is_empty());
    assert!(!report.truncated);

    let stats = orchestrator.scheduler().domain_stats("127.0.0.1").unwrap();
    assert!((stats.rate_per_second - 200.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_missing_robots_does_not_penalize_domain() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", &[]).await;

    let orchestrator = orchestrator(&config_with(""));
    let mut discovery = Discovery::new(orchestrator.clone(), DiscoveryConfig::default(), "TestBot");

    let report = discovery.run(&server.uri()).await.unwrap();

    assert_eq!(report.visited.len(), 1);
    assert_eq!(report.disallowed_by_robots, 0);

    let stats = orchestrator.scheduler().domain_stats("127.0.0.1").unwrap();
    assert_eq!(stats.fail_count, 0);
    assert_eq!(stats.total_failures, 0);
    assert_eq!(stats.total_permits, 2);
}

#[tokio::test]
async fn test_discovery_stops_at_max_urls() {
    let server = MockServer::start().await;

    mount_page(&server, "/", &["/a", "/b", "/c"]).await;
    mount_page(&server, "/a", &[]).await;

    let config = DiscoveryConfig {
        max_depth: 3,
        max_urls: 2,
        respect_robots: false,
        ..DiscoveryConfig::default()
    };
    let mut discovery = Discovery::new(orchestrator(&config_with("")), config, "TestBot");

    let report = discovery.run(&server.uri()).await.unwrap();

    assert!(report.truncated);
    assert_eq!(report.discovered.len(), 2);
    assert_eq!(report.visited.len(), 2);
    assert_eq!(report.disallowed_by_robots, 0);
}

#[tokio::test]
async fn test_discovery_reports_failed_pages() {
    let server = MockServer::start().await;

    mount_page(&server, "/", &["/missing"]).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = DiscoveryConfig {
        respect_robots: false,
        ..DiscoveryConfig::default()
    };
    let mut discovery = Discovery::new(orchestrator(&config_with("")), config, "TestBot");

    let report = discovery.run(&server.uri()).await.unwrap();

    assert_eq!(report.visited.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].url.ends_with("/missing"));
    assert_eq!(report.failed[0].depth, 1);
    assert!(report.failed[0].error.contains("404"));
}

#[tokio::test]
async fn test_discovery_rejects_bad_pattern() {
    let config = DiscoveryConfig {
        include: vec!["(unclosed".to_string()],
        ..DiscoveryConfig::default()
    };
    let mut discovery = Discovery::new(orchestrator(&config_with("")), config, "TestBot");

    assert!(discovery.run("https://example.com/").await.is_err());
}
