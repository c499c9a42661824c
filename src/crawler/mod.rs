//! Crawl discovery
//!
//! A breadth-first consumer of the orchestrator. This module handles:
//! - Walking a frontier of normalized URLs level by level
//! - Extracting outbound links from fetched bodies
//! - Filtering by domain, path prefix and include/exclude patterns
//! - Honoring robots.txt, including `Crawl-delay`
//!
//! All fetching, including robots.txt, goes through
//! [`Orchestrator::fetch_raw`](crate::Orchestrator::fetch_raw), so discovery
//! obeys the same per-domain admission control as every other caller.

mod discovery;
mod filter;
mod links;
mod robots;

pub use discovery::{Discovery, DiscoveryReport, FailedPage, VisitedPage};
pub use filter::LinkFilter;
pub use links::extract_links;
pub use robots::RobotsRules;
