use crate::{UrlError, UrlResult};
use url::{form_urlencoded, Url};

/// Click identifiers that never identify an item; `utm_*` is matched by prefix
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "msclkid", "mc_eid"];

/// Canonicalizes a URL so equivalent spellings of an item link share one key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host
/// 3. Normalize path:
///    - Remove dot segments (. and ..) and empty segments
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 4. Remove fragment (everything after #)
/// 5. Remove tracking query parameters
/// 6. Sort remaining query parameters alphabetically and re-encode them
/// 7. Remove empty query string (trailing ?)
///
/// The scheme is preserved: `http://` and `https://` spellings stay distinct.
///
/// # Examples
///
/// ```
/// use tidemark::url::canonicalize;
///
/// let url = canonicalize("https://EXAMPLE.COM/books/a/../b/?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/books/b");
/// ```
pub fn canonicalize(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&params)
                .finish();
            url.set_query(Some(&query_string));
        }
    }

    Ok(url)
}

/// Resolves `href` against the page it appeared on and canonicalizes it
///
/// Returns the canonical key string, or `None` for hrefs that cannot name an
/// item (empty, fragment-only, `javascript:`/`mailto:`/`tel:`/`data:`).
pub fn resolve_key(href: &str, page_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = page_url.join(href).ok()?;
    canonicalize(absolute.as_str()).ok().map(String::from)
}

fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
