//! Content quality evaluation
//!
//! A backend can "succeed" at the transport level and still hand back a page
//! that is useless: a client-side-rendered shell, a consent wall, a
//! "Loading..." placeholder. The evaluator turns such results into an
//! escalation signal for the orchestrator.

use crate::backend::extract::visible_text;
use crate::config::StrategyConfig;
use scraper::{Html, Selector};

/// Mount points used by client-side frameworks
const MOUNT_SELECTORS: &str =
    "#root, #app, #__next, #__nuxt, #___gatsby, #svelte, [data-reactroot], app-root, [ng-app]";

/// Globals and attributes that client frameworks inject to bootstrap rendering
const BOOTSTRAP_MARKERS: &[&str] = &[
    "__NEXT_DATA__",
    "window.__NUXT__",
    "window.__INITIAL_STATE__",
    "window.__APOLLO_STATE__",
    "window.__PRELOADED_STATE__",
    "ng-version=",
];

/// Body text shown by apps that refuse to work without scripting
const SCRIPT_REQUIRED_NOTICES: &[&str] = &[
    "enable javascript",
    "javascript is required",
    "requires javascript",
    "javascript is disabled",
];

/// Titles served by interstitials and loading screens
const PLACEHOLDER_TITLES: &[&str] = &[
    "loading",
    "loading...",
    "untitled",
    "just a moment...",
    "attention required!",
    "access denied",
    "please wait",
    "redirecting",
    "one moment, please...",
];

/// Why a result should be escalated to a stronger backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationReason {
    /// HTML is a client-side-rendered shell with no content
    UnrenderedShell,
    /// Extracted text is shorter than the configured minimum
    InsufficientText { length: usize },
    /// No title, an empty one, or one shorter than the minimum
    MissingTitle,
    /// Title of an interstitial or loading screen
    PlaceholderTitle(String),
}

/// Result of evaluating a fetch result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityVerdict {
    Acceptable,
    Escalate(EscalationReason),
}

impl QualityVerdict {
    pub fn should_escalate(&self) -> bool {
        matches!(self, Self::Escalate(_))
    }
}

/// Pure evaluator over fetched HTML/text/title
#[derive(Debug, Clone)]
pub struct QualityEvaluator {
    min_text_length: usize,
    min_title_length: usize,
}

impl QualityEvaluator {
    pub fn new(min_text_length: usize, min_title_length: usize) -> Self {
        Self {
            min_text_length,
            min_title_length,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.min_text_length, config.min_title_length)
    }

    pub fn min_text_length(&self) -> usize {
        self.min_text_length
    }

    /// Whether the page needs JavaScript execution to show its content
    ///
    /// True when the document carries a framework marker (an empty mount
    /// node, a bootstrap global, or a "please enable JavaScript" notice) and
    /// its visible text is below the content minimum.
    pub fn is_likely_unrendered_shell(&self, html: &str) -> bool {
        if html.trim().is_empty() {
            return false;
        }

        let document = Html::parse_document(html);
        let text = visible_text(&document);
        if text.chars().count() >= self.min_text_length {
            return false;
        }

        has_empty_mount(&document)
            || BOOTSTRAP_MARKERS.iter().any(|marker| html.contains(marker))
            || {
                let lowered = text.to_lowercase();
                SCRIPT_REQUIRED_NOTICES
                    .iter()
                    .any(|notice| lowered.contains(notice))
            }
    }

    /// Whether the trimmed text reaches the configured minimum length
    pub fn has_sufficient_content(&self, text: &str) -> bool {
        text.trim().chars().count() >= self.min_text_length
    }

    /// Full evaluation, reporting the first failed check
    pub fn evaluate(&self, html: &str, text: &str, title: Option<&str>) -> QualityVerdict {
        if self.is_likely_unrendered_shell(html) {
            return QualityVerdict::Escalate(EscalationReason::UnrenderedShell);
        }

        if !self.has_sufficient_content(text) {
            return QualityVerdict::Escalate(EscalationReason::InsufficientText {
                length: text.trim().chars().count(),
            });
        }

        let title = title.map(str::trim).unwrap_or_default();
        if title.chars().count() < self.min_title_length.max(1) {
            return QualityVerdict::Escalate(EscalationReason::MissingTitle);
        }

        let lowered = title.to_lowercase();
        if PLACEHOLDER_TITLES.contains(&lowered.as_str()) {
            return QualityVerdict::Escalate(EscalationReason::PlaceholderTitle(title.to_string()));
        }

        QualityVerdict::Acceptable
    }

    /// Whether a result should trigger backend escalation
    pub fn should_escalate(&self, html: &str, text: &str, title: Option<&str>) -> bool {
        self.evaluate(html, text, title).should_escalate()
    }
}

impl Default for QualityEvaluator {
    fn default() -> Self {
        Self::new(200, 3)
    }
}

fn has_empty_mount(document: &Html) -> bool {
    let Ok(selector) = Selector::parse(MOUNT_SELECTORS) else {
        return false;
    };

    document.select(&selector).any(|element| {
        element.children().all(|child| match child.value().as_text() {
            Some(text) => text.trim().is_empty(),
            None => child.value().is_comment(),
        })
    })
}
