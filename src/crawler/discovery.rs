use super::filter::LinkFilter;
use super::links::extract_links;
use super::robots::RobotsRules;
use crate::config::DiscoveryConfig;
use crate::orchestrator::{FetchOptions, Orchestrator, RawResult};
use crate::scheduler::DomainLimitUpdate;
use crate::strategy::Strategy;
use crate::url::{domain_of, extract_domain, normalize_url};
use crate::FetchError;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use url::Url;

/// One page fetched during discovery
#[derive(Debug, Clone, Serialize)]
pub struct VisitedPage {
    pub url: String,
    pub depth: u32,
    pub status_code: u16,
    pub strategy: Strategy,
    /// Links that passed the filters and were new
    pub new_links: usize,
}

/// A frontier URL that could not be fetched
#[derive(Debug, Clone, Serialize)]
pub struct FailedPage {
    pub url: String,
    pub depth: u32,
    pub error: String,
}

/// Outcome of a discovery run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub seed: String,
    /// Every unique normalized URL seen, in discovery order
    pub discovered: Vec<String>,
    pub visited: Vec<VisitedPage>,
    pub failed: Vec<FailedPage>,
    pub disallowed_by_robots: usize,
    /// Deepest level that was fetched
    pub depth_reached: u32,
    /// Discovery stopped adding URLs because `max-urls` was reached
    pub truncated: bool,
}

/// Breadth-first link discovery over [`Orchestrator::fetch_raw`]
///
/// Each level of the frontier is fetched concurrently; the scheduler is
/// the only throttle.
pub struct Discovery {
    orchestrator: Arc<Orchestrator>,
    config: DiscoveryConfig,
    user_agent: String,
    robots: HashMap<String, RobotsRules>,
}

impl Discovery {
    /// # Arguments
    ///
    /// * `orchestrator` - Shared orchestrator (and therefore scheduler)
    /// * `config` - Bounds and filters
    /// * `user_agent` - Product token matched against robots.txt groups
    pub fn new(orchestrator: Arc<Orchestrator>, config: DiscoveryConfig, user_agent: &str) -> Self {
        Self {
            orchestrator,
            config,
            user_agent: user_agent.to_string(),
            robots: HashMap::new(),
        }
    }

    /// Runs discovery from `seed`
    ///
    /// # Errors
    ///
    /// Only for an unusable seed or invalid filter patterns; fetch failures
    /// are collected in the report.
    pub async fn run(&mut self, seed: &str) -> Result<DiscoveryReport, FetchError> {
        let seed_url = normalize_url(seed)?;
        let (_, seed_domain) = domain_of(seed_url.as_str())?;
        let filter = LinkFilter::new(&self.config, &seed_domain)?;
        let options = FetchOptions::new();

        let mut report = DiscoveryReport {
            seed: seed_url.to_string(),
            ..DiscoveryReport::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(seed_url.to_string());
        report.discovered.push(seed_url.to_string());

        let mut frontier = vec![seed_url];
        let mut depth = 0;

        tracing::info!(
            "Discovery from {} (max depth {}, max urls {})",
            report.seed,
            self.config.max_depth,
            self.config.max_urls
        );

        while !frontier.is_empty() && depth <= self.config.max_depth {
            let mut allowed = Vec::with_capacity(frontier.len());
            for url in frontier.drain(..) {
                if self.is_allowed(&url).await {
                    allowed.push(url);
                } else {
                    tracing::debug!("robots.txt disallows {}", url);
                    report.disallowed_by_robots += 1;
                }
            }

            let orchestrator = &self.orchestrator;
            let options = &options;
            let results = join_all(
                allowed
                    .iter()
                    .map(|url| orchestrator.fetch_raw(url.as_str(), options)),
            )
            .await;

            report.depth_reached = depth;
            let mut next = Vec::new();

            for (url, result) in allowed.into_iter().zip(results) {
                match result {
                    Ok(raw) => {
                        let new_links = if depth < self.config.max_depth {
                            self.enqueue_links(&raw, &filter, &mut seen, &mut next, &mut report)
                        } else {
                            0
                        };
                        report.visited.push(VisitedPage {
                            url: url.to_string(),
                            depth,
                            status_code: raw.status_code,
                            strategy: raw.strategy_used,
                            new_links,
                        });
                    }
                    Err(err) => {
                        tracing::warn!("Discovery fetch failed for {}: {}", url, err);
                        report.failed.push(FailedPage {
                            url: url.to_string(),
                            depth,
                            error: err.to_string(),
                        });
                    }
                }
            }

            frontier = next;
            depth += 1;
        }

        tracing::info!(
            "Discovery finished: {} discovered, {} visited, {} failed",
            report.discovered.len(),
            report.visited.len(),
            report.failed.len()
        );

        Ok(report)
    }

    fn enqueue_links(
        &self,
        raw: &RawResult,
        filter: &LinkFilter,
        seen: &mut HashSet<String>,
        next: &mut Vec<Url>,
        report: &mut DiscoveryReport,
    ) -> usize {
        let is_html = raw
            .content_type
            .as_deref()
            .map_or(true, |ct| ct.to_ascii_lowercase().contains("html"));
        if !is_html {
            return 0;
        }
        let Ok(page_url) = Url::parse(&raw.final_url) else {
            return 0;
        };

        let mut added = 0;
        for link in extract_links(&raw.body, &page_url) {
            let Ok(normalized) = normalize_url(link.as_str()) else {
                continue;
            };
            if !filter.accepts(&normalized) || seen.contains(normalized.as_str()) {
                continue;
            }
            if seen.len() >= self.config.max_urls {
                report.truncated = true;
                break;
            }

            seen.insert(normalized.to_string());
            report.discovered.push(normalized.to_string());
            next.push(normalized);
            added += 1;
        }
        added
    }

    /// Checks robots.txt, fetching and caching it on first use per domain
    async fn is_allowed(&mut self, url: &Url) -> bool {
        if !self.config.respect_robots {
            return true;
        }
        let Some(domain) = extract_domain(url) else {
            return true;
        };

        if !self.robots.contains_key(&domain) {
            let rules = self.fetch_robots(url, &domain).await;
            self.robots.insert(domain.clone(), rules);
        }

        self.robots
            .get(&domain)
            .map_or(true, |rules| rules.is_allowed(url.as_str(), &self.user_agent))
    }

    /// Fetches robots.txt with a single local attempt; failures allow all
    ///
    /// A missing robots.txt (404/410) does not count against the domain.
    async fn fetch_robots(&self, url: &Url, domain: &str) -> RobotsRules {
        let mut robots_url = url.clone();
        robots_url.set_path("/robots.txt");
        robots_url.set_query(None);
        robots_url.set_fragment(None);

        let options = FetchOptions::new()
            .with_strategy(Strategy::Local)
            .allow_missing();
        let rules = match self.orchestrator.fetch_raw(robots_url.as_str(), &options).await {
            Ok(raw) => RobotsRules::from_content(&raw.body),
            Err(err) => {
                tracing::debug!("No robots.txt for {}: {}", domain, err);
                RobotsRules::allow_all()
            }
        };

        if let Some(delay) = rules.crawl_delay(&self.user_agent) {
            self.apply_crawl_delay(domain, delay.as_secs_f64());
        }

        rules
    }

    /// Lowers the domain's rate to honor `Crawl-delay`; never raises it
    fn apply_crawl_delay(&self, domain: &str, delay_secs: f64) {
        let rps = 1.0 / delay_secs;
        let scheduler = self.orchestrator.scheduler();
        let current = scheduler
            .domain_stats(domain)
            .map(|stats| stats.rate_per_second);

        if current.map_or(true, |current| rps < current) {
            match scheduler.set_domain_limit(domain, DomainLimitUpdate::rps(rps)) {
                Ok(_) => tracing::info!("Crawl-delay {}s for {} applied", delay_secs, domain),
                Err(err) => tracing::warn!("Ignoring Crawl-delay for {}: {}", domain, err),
            }
        }
    }
}
