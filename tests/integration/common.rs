use ripple_fetch::config::{parse_config, Config};
use ripple_fetch::Orchestrator;
use std::sync::Arc;

/// Fast limits and short backoff so tests never wait on real time
const BASE: &str = r#"
[scheduler]
default-max-concurrent = 8
default-rps = 1000.0

[circuit-breaker]
fail-threshold = 3
open-duration-ms = 60000
initial-backoff-ms = 5
max-backoff-ms = 50
max-admission-wait-ms = 5000

[fetch]
timeout-ms = 5000

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"
"#;

/// Parses the base config plus extra TOML sections
pub fn config_with(extra: &str) -> Config {
    parse_config(&format!("{}\n{}", BASE, extra)).expect("test config should be valid")
}

/// Extra TOML declaring the given remote/browser service URLs
pub fn backends_toml(remote: Option<&str>, browser: Option<&str>) -> String {
    let mut toml = String::new();
    if let Some(url) = remote {
        toml.push_str(&format!("[backends.remote]\nurl = \"{}\"\n\n", url));
    }
    if let Some(url) = browser {
        toml.push_str(&format!(
            "[backends.browser]\nurl = \"{}\"\ntoken = \"secret\"\n\n",
            url
        ));
    }
    toml
}

pub fn orchestrator(config: &Config) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::from_config(config).expect("orchestrator should build"))
}

/// An article long enough to pass the quality checks
pub fn article_html(title: &str) -> String {
    format!(
        "<html><head><title>{}</title></head><body><article><p>{}</p></article></body></html>",
        title,
        "The city council approved the transit budget after a long debate. ".repeat(8)
    )
}
