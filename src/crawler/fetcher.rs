//! HTTP fetcher for source workers
//!
//! This module handles the requests a worker sends, including:
//! - Building HTTP clients for an evasion strategy (proxy, cookie store)
//! - Applying the strategy's rotated identity headers per request
//! - Detecting anti-bot responses (challenge pages, captchas, 403/429)
//! - Classifying transport errors into worker errors

use crate::tracker::EvasionStrategy;
use crate::WorkerError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use std::time::Duration;
use url::Url;

/// URL fragments that show a request was bounced to a challenge page
const BLOCK_URL_MARKERS: &[&str] = &["challenge", "captcha", "splashui", "blocked"];

/// Phrases that only appear on anti-bot interstitials
const BLOCK_BODY_PHRASES: &[&str] = &[
    "captcha",
    "access denied",
    "bot detection",
    "verification required",
    "challenge page",
    "are you a robot",
    "splashui",
];

/// A successfully fetched results page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    pub status_code: u16,
    pub body: String,
}

/// Builds an HTTP client for one evasion strategy
///
/// The client carries transport settings only (proxy, cookie store, connect
/// timeout); identity headers are applied per request so rotation works with
/// a reused client.
///
/// # Arguments
///
/// * `strategy` - The evasion strategy the client serves
/// * `proxy_url` - Configured forward proxy, used when the strategy requires one
/// * `source_name` - Source the client is for, used in errors and logs
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(WorkerError)` - The proxy URL or TLS backend was rejected
pub fn build_client(
    strategy: &EvasionStrategy,
    proxy_url: Option<&str>,
    source_name: &str,
) -> Result<Client, WorkerError> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(!strategy.fresh_session)
        .gzip(true)
        .brotli(true);

    if strategy.requires_proxy {
        match proxy_url {
            Some(proxy) => {
                let proxy = Proxy::all(proxy).map_err(|e| WorkerError::Connection {
                    source_name: source_name.to_string(),
                    message: format!("invalid proxy: {}", e),
                })?;
                builder = builder.proxy(proxy);
            }
            None => {
                tracing::warn!(
                    source = %source_name,
                    "Evasion level {} requires a proxy but none is configured, connecting directly",
                    strategy.level
                );
            }
        }
    }

    builder.build().map_err(|e| WorkerError::Connection {
        source_name: source_name.to_string(),
        message: format!("failed to build HTTP client: {}", e),
    })
}

/// Picks one identity from the strategy and turns it into request headers
pub fn identity_headers(strategy: &EvasionStrategy) -> HeaderMap {
    let identity = strategy.pick_headers();
    let mut headers = HeaderMap::new();

    headers.insert(USER_AGENT, HeaderValue::from_static(identity.user_agent));
    for &(name, value) in identity.headers {
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }

    headers
}

/// Fetches a results page and classifies the outcome
///
/// # Outcome Mapping
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 403 / 429, challenge URL or anti-bot body | `Blocked` |
/// | Other non-success status | `HttpStatus` |
/// | Request timeout | `Timeout` |
/// | Connect / transport failure | `Connection` |
/// | 2xx with a normal page | `Ok(FetchedPage)` |
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    headers: HeaderMap,
    timeout: Duration,
    source_name: &str,
) -> Result<FetchedPage, WorkerError> {
    let response = client
        .get(url.clone())
        .headers(headers)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify_transport_error(e, timeout, source_name))?;

    let status = response.status();
    let final_url = response.url().clone();

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(WorkerError::Blocked {
            source_name: source_name.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    if !status.is_success() {
        return Err(WorkerError::HttpStatus {
            source_name: source_name.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| classify_transport_error(e, timeout, source_name))?;

    if let Some(reason) = detect_block(&final_url, &body) {
        return Err(WorkerError::Blocked {
            source_name: source_name.to_string(),
            reason,
        });
    }

    Ok(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        body,
    })
}

/// Looks for anti-bot markers in a 2xx response
///
/// Returns a short reason when the page is a block rather than results.
/// URL markers are looked for in the host and path only; the query string
/// carries the user's search text.
pub fn detect_block(final_url: &Url, body: &str) -> Option<String> {
    let location = format!(
        "{}{}",
        final_url.host_str().unwrap_or_default(),
        final_url.path()
    )
    .to_lowercase();
    if let Some(marker) = BLOCK_URL_MARKERS.iter().find(|m| location.contains(*m)) {
        return Some(format!("redirected to {} page", marker));
    }

    let body = body.to_lowercase();
    BLOCK_BODY_PHRASES
        .iter()
        .find(|p| body.contains(*p))
        .map(|phrase| format!("page contains '{}'", phrase))
}

fn classify_transport_error(e: reqwest::Error, timeout: Duration, source_name: &str) -> WorkerError {
    if e.is_timeout() {
        WorkerError::Timeout {
            source_name: source_name.to_string(),
            after: timeout,
        }
    } else {
        WorkerError::Connection {
            source_name: source_name.to_string(),
            message: e.to_string(),
        }
    }
}
