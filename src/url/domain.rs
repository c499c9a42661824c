use crate::{UrlError, UrlResult};
use url::Url;

/// Normalizes a hostname into the key used for per-domain state
///
/// Lowercases, trims surrounding whitespace and a trailing root dot, and drops
/// a leading `www.` so that `www.example.com` and `example.com` share limits.
///
/// # Examples
///
/// ```
/// use ripple_fetch::url::normalize_host;
///
/// assert_eq!(normalize_host("WWW.Example.COM."), "example.com");
/// assert_eq!(normalize_host("news.example.com"), "news.example.com");
/// ```
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    }
}

/// Extracts the normalized domain from a parsed URL
///
/// Returns `None` for URLs without a host (e.g. `data:` URLs).
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(normalize_host)
}

/// Parses a URL string and returns it together with its normalized domain
///
/// Only `http` and `https` URLs are accepted.
pub fn domain_of(url_str: &str) -> UrlResult<(Url, String)> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let domain = extract_domain(&url).ok_or(UrlError::MissingDomain)?;
    if domain.is_empty() {
        return Err(UrlError::MissingDomain);
    }

    Ok((url, domain))
}
