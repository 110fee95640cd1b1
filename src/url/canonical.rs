use crate::UrlError;
use sha2::{Digest, Sha256};
use url::Url;

/// Query parameters that only carry click tracking and never identify a listing
const TRACKING_PARAMS: &[&str] = &[
    "_trkparms",
    "_trksid",
    "hash",
    "fbclid",
    "gclid",
    "ref",
];

/// Canonicalizes a listing URL so the same listing always yields the same key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Only http and https are accepted
/// 3. Host is lowercased (done by the parser)
/// 4. Fragment is removed
/// 5. Tracking query parameters (`utm_*` and the marketplace click
///    trackers) are removed
/// 6. Remaining query parameters are sorted by key
/// 7. An empty query string is dropped entirely
///
/// The path is kept as-is: listing sites treat `/itm/123` and `/itm/123/` as
/// different resources often enough that folding them would merge listings.
///
/// # Examples
///
/// ```
/// use gear_sweep::url::canonical_listing_url;
///
/// let url = canonical_listing_url("https://WWW.EBAY.COM/itm/123?_trksid=p1&b=2&a=1#tab").unwrap();
/// assert_eq!(url.as_str(), "https://www.ebay.com/itm/123?a=1&b=2");
/// ```
pub fn canonical_listing_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        url.set_query(None);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Resolves a link found on a results page against the page's base URL
pub fn resolve_href(base: &Url, href: &str) -> Result<Url, UrlError> {
    base.join(href.trim())
        .map_err(|e| UrlError::Parse(format!("{} (relative to {}): {}", href, base, e)))
}

/// Stable listing identifier: `<source-slug>_<first 12 hex of sha256(url)>`
pub fn listing_id(source_name: &str, canonical_url: &str) -> String {
    let digest = Sha256::digest(canonical_url.as_bytes());
    let hash = hex::encode(digest);
    format!("{}_{}", source_slug(source_name), &hash[..12])
}

/// Lowercase, underscore-separated form of a source name
pub fn source_slug(source_name: &str) -> String {
    let mut slug = String::with_capacity(source_name.len());
    for c in source_name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("source");
    }
    slug
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
