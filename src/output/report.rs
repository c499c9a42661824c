//! Fetch, batch and discovery result display

use crate::crawler::DiscoveryReport;
use crate::orchestrator::{FetchResult, RawResult};
use crate::strategy::Strategy;
use std::collections::BTreeMap;

/// Characters of extracted text shown in previews
const PREVIEW_CHARS: usize = 400;

/// Counts over a batch of fetch results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub escalated: usize,
    pub credential_expired: usize,
    pub by_strategy: BTreeMap<Strategy, usize>,
}

impl BatchSummary {
    pub fn from_results(results: &[FetchResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            if result.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if result.escalated {
                summary.escalated += 1;
            }
            if result.credential_likely_expired {
                summary.credential_expired += 1;
            }
            if let Some(strategy) = result.strategy_used {
                *summary.by_strategy.entry(strategy).or_default() += 1;
            }
        }

        summary
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    preview
}

/// Prints a single fetch result
pub fn print_fetch_result(result: &FetchResult) {
    if result.success {
        println!("✓ {}", result.final_url);
    } else {
        println!("✗ {}", result.url);
    }

    if let Some(strategy) = result.strategy_used {
        let via = if result.escalated { " (escalated)" } else { "" };
        println!("  Strategy: {}{}", strategy, via);
    }
    if !result.attempted.is_empty() {
        let attempted: Vec<&str> = result.attempted.iter().map(Strategy::as_str).collect();
        println!("  Attempted: {}", attempted.join(" -> "));
    }
    println!("  Duration: {}ms", result.duration_ms);
    if result.authenticated {
        println!("  Authenticated: yes");
    }
    if result.credential_likely_expired {
        println!("  ⚠ Credential likely expired");
    }
    if let Some(title) = &result.title {
        println!("  Title: {}", title);
    }
    if let Some(error) = &result.error {
        println!("  Error: {}", error);
    }
    if let Some(text) = result.text_content.as_deref().filter(|t| !t.is_empty()) {
        println!("  Text ({} chars):\n\n{}\n", result.text_len(), preview(text));
    }
}

/// Prints a raw result header followed by the body
pub fn print_raw_result(raw: &RawResult) {
    println!("✓ {} [{}]", raw.final_url, raw.status_code);
    println!("  Strategy: {}", raw.strategy_used);
    println!(
        "  Content-Type: {}",
        raw.content_type.as_deref().unwrap_or("unknown")
    );
    println!("  Duration: {}ms", raw.duration_ms);
    println!("  Body: {} bytes\n", raw.body.len());
    println!("{}", raw.body);
}

/// Prints one line per result followed by totals
pub fn print_batch(results: &[FetchResult]) {
    println!("=== Batch Results ===\n");

    for result in results {
        match (&result.strategy_used, &result.error) {
            (Some(strategy), _) => println!(
                "  ✓ {:<8} {:>6}ms  {}",
                strategy, result.duration_ms, result.url
            ),
            (None, Some(error)) => println!("  ✗ {}: {}", result.url, error),
            (None, None) => println!("  ✗ {}", result.url),
        }
    }

    let summary = BatchSummary::from_results(results);
    println!();
    println!(
        "  {} fetched, {} failed, {} escalated",
        summary.succeeded, summary.failed, summary.escalated
    );
    for (strategy, count) in &summary.by_strategy {
        println!("    {}: {}", strategy, count);
    }
    if summary.credential_expired > 0 {
        println!("  ⚠ {} results suggest expired credentials", summary.credential_expired);
    }
    println!();
}

/// Prints a discovery report
pub fn print_discovery_report(report: &DiscoveryReport) {
    println!("=== Discovery: {} ===\n", report.seed);

    println!("Overview:");
    println!("  URLs discovered: {}", report.discovered.len());
    println!("  Pages visited: {}", report.visited.len());
    println!("  Failed: {}", report.failed.len());
    println!("  Disallowed by robots.txt: {}", report.disallowed_by_robots);
    println!("  Depth reached: {}", report.depth_reached);
    if report.truncated {
        println!("  (stopped at the URL limit)");
    }
    println!();

    println!("Discovered URLs:");
    for url in &report.discovered {
        println!("  {}", url);
    }
    println!();

    if !report.failed.is_empty() {
        println!("Failures:");
        for failure in &report.failed {
            println!("  [depth {}] {}: {}", failure.depth, failure.url, failure.error);
        }
        println!();
    }
}
