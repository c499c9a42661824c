//! Outbound link extraction for discovery

use scraper::{Html, Selector};
use url::Url;

/// Extracts followable links from an HTML body
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` and `<area href="...">`
/// - `<link rel="canonical" href="...">` and `<link rel="next" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - fragment-only links
/// - anything that does not resolve to http(s)
///
/// Relative links resolve against `<base href>` when present, else the page URL.
///
/// # Arguments
///
/// * `html` - The page body
/// * `page_url` - The final URL the body was served from
///
/// # Returns
///
/// Absolute URLs in document order; duplicates are left to the caller
pub fn extract_links(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);
    let mut links = Vec::new();

    if let Ok(anchors) = Selector::parse("a[href], area[href]") {
        for element in document.select(&anchors) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, &base)) {
                links.push(url);
            }
        }
    }

    if let Ok(related) = Selector::parse("link[href][rel]") {
        for element in document.select(&related) {
            let rel = element.value().attr("rel").unwrap_or_default().to_ascii_lowercase();
            if !rel.split_whitespace().any(|r| r == "canonical" || r == "next") {
                continue;
            }
            if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, &base)) {
                links.push(url);
            }
        }
    }

    links
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|base| base.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves an href to an absolute http(s) URL, or `None` if it is not followable
fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
