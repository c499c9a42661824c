//! URL handling module for Ripple-Fetch
//!
//! This module provides hostname normalization (the admission-control key),
//! wildcard domain matching for rule tables, and URL normalization used by
//! crawl discovery for deduplication.

mod domain;
mod matcher;
mod normalize;

pub use domain::{domain_of, extract_domain, normalize_host};
pub use matcher::{matches_wildcard, normalize_pattern, DomainTable};
pub use normalize::normalize_url;
