use crate::{UrlError, UrlResult};
use url::Url;

/// Query parameters that only carry tracking data
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "mc_cid", "igshid", "ref_src"];

/// Normalizes a URL for crawl deduplication
///
/// The result is still a fetchable URL: scheme and host are kept (the `url`
/// crate already lowercases the host), only noise is removed.
///
/// 1. Reject anything that is not `http`/`https` or has no host
/// 2. Collapse repeated slashes and `.`/`..` segments in the path
/// 3. Drop a trailing slash (root `/` stays)
/// 4. Drop the fragment
/// 5. Drop tracking parameters (`utm_*`, `fbclid`, ...) and sort the rest
///
/// # Examples
///
/// ```
/// use ripple_fetch::url::normalize_url;
///
/// let url = normalize_url("https://Example.com//news/./a/?utm_source=x&b=2&a=1#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/news/a?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
