//! Backend selection
//!
//! - [`Strategy`]: the closed set of retrieval backends, in escalation order
//! - [`StrategyRules`]: domain pattern table mapping a host to its preferred backend
//! - [`QualityEvaluator`]: decides whether a result is usable or must escalate

mod quality;
mod rules;

pub use quality::{EscalationReason, QualityEvaluator, QualityVerdict};
pub use rules::{DomainRule, ResolvedStrategy, StrategyRules};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A retrieval backend
///
/// Variants are ordered from cheapest to strongest; fallback and escalation
/// walk [`Strategy::PRIORITY`] forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Remote high-throughput fetch service
    #[serde(alias = "go")]
    Remote,
    /// Headless-browser rendering service
    #[serde(alias = "browserless")]
    Browser,
    /// Direct fetch from this process
    Local,
}

impl Strategy {
    /// Escalation order
    pub const PRIORITY: [Strategy; 3] = [Strategy::Remote, Strategy::Browser, Strategy::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Browser => "browser",
            Self::Local => "local",
        }
    }

    /// `self` followed by every backend after it in priority order
    pub fn escalation_path(self) -> impl Iterator<Item = Strategy> {
        Self::PRIORITY.into_iter().filter(move |s| *s >= self)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "go" => Ok(Self::Remote),
            "browser" | "browserless" => Ok(Self::Browser),
            "local" => Ok(Self::Local),
            other => Err(format!(
                "unknown strategy '{}' (expected remote, browser or local)",
                other
            )),
        }
    }
}
