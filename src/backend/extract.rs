//! Content extraction from raw HTML
//!
//! A deliberately small extractor: title from `<title>`/`og:title`/`<h1>`,
//! readable text from the first `<article>` or `<main>` that has any, falling
//! back to the whole document. Script, style and template text is skipped.

use scraper::{ElementRef, Html, Selector};

/// Elements whose text never reaches the reader
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Extracted page content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub text: String,
}

/// Extracts title and readable text from an HTML document
pub fn extract_page(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);

    ExtractedPage {
        title: extract_title(&document),
        text: main_text(&document),
    }
}

/// All visible text in the document, whitespace-collapsed
pub fn visible_text(document: &Html) -> String {
    element_text(document.root_element())
}

fn extract_title(document: &Html) -> Option<String> {
    first_text(document, "title")
        .or_else(|| first_attr(document, r#"meta[property="og:title"]"#, "content"))
        .or_else(|| first_text(document, "h1"))
}

fn main_text(document: &Html) -> String {
    for candidate in ["article", "main", "[role=main]"] {
        let Ok(selector) = Selector::parse(candidate) else {
            continue;
        };

        let text = document
            .select(&selector)
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if !text.is_empty() {
            return text;
        }
    }

    visible_text(document)
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .find(|s| !s.is_empty())
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr(attr))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });

        if !hidden {
            pieces.push(&**text);
        }
    }

    collapse_whitespace(&pieces.join(" "))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
