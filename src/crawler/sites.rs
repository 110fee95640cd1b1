//! Reference source workers
//!
//! One generic HTML results-page worker, parameterised per site by a
//! [`SiteProfile`]. Site-specific knowledge lives entirely in the profile
//! table below.

use crate::config::{Config, SourceKind};
use crate::crawler::fetcher::{build_client, fetch_page, identity_headers};
use crate::crawler::parser::{extract_listings, ListingSelectors};
use crate::crawler::worker::{RawListing, SourceWorker};
use crate::tracker::{EvasionLevel, EvasionStrategy};
use crate::url::resolve_href;
use crate::{SweepError, UrlError, WorkerError};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;
use url::Url;

/// Placeholder in a search path replaced by the form-encoded query
const QUERY_PLACEHOLDER: &str = "{query}";

/// How to search one site and read its results
#[derive(Debug, Clone, Copy)]
pub struct SiteProfile {
    pub kind: SourceKind,
    pub default_base_url: &'static str,
    /// Path and query of the search page, relative to the base URL
    pub search_path: &'static str,
    pub selectors: ListingSelectors,
}

pub static EBAY: SiteProfile = SiteProfile {
    kind: SourceKind::Ebay,
    default_base_url: "https://www.ebay.com",
    search_path: "/sch/i.html?_nkw={query}",
    selectors: ListingSelectors {
        card: "li.s-item, div.s-item",
        title: ".s-item__title",
        link: "a.s-item__link",
        price: ".s-item__price",
        condition: ".s-item__subtitle .SECONDARY_INFO, .s-item__condition",
        location: ".s-item__location",
        image: ".s-item__image img, img",
        skip_titles: &["Shop on eBay"],
    },
};

pub static LABX: SiteProfile = SiteProfile {
    kind: SourceKind::Labx,
    default_base_url: "https://www.labx.com",
    search_path: "/search?q={query}",
    selectors: ListingSelectors {
        card: "div.listing-item, div.product-item, .search-result-item",
        title: "h3 a, .title a, h2 a",
        link: "h3 a, .title a, h2 a",
        price: ".price, .cost, .amount",
        condition: ".condition, .status",
        location: ".location, .seller-location",
        image: "img",
        skip_titles: &[],
    },
};

pub static GOVDEALS: SiteProfile = SiteProfile {
    kind: SourceKind::Govdeals,
    default_base_url: "https://www.govdeals.com",
    search_path: "/index.cfm?fa=Main.Search&searchtype=1&searchterm={query}",
    selectors: ListingSelectors {
        card: "div.search-result-item, div.listing-item, .auction-item",
        title: "h3 a, .title a, h2 a",
        link: "h3 a, .title a, h2 a",
        price: ".current-bid, .starting-bid, .price",
        condition: ".condition, .status",
        location: ".location, .agency-location",
        image: "img",
        skip_titles: &[],
    },
};

pub static BIDSPOTTER: SiteProfile = SiteProfile {
    kind: SourceKind::Bidspotter,
    default_base_url: "https://www.bidspotter.com",
    search_path: "/en-us/search?q={query}",
    selectors: ListingSelectors {
        card: "div.lot-item, div.auction-item, .search-result",
        title: "h3 a, .lot-title a, h2 a",
        link: "h3 a, .lot-title a, h2 a",
        price: ".current-bid, .estimate, .price",
        condition: ".condition, .status",
        location: ".location, .auction-location",
        image: "img",
        skip_titles: &[],
    },
};

pub static DOTMED: SiteProfile = SiteProfile {
    kind: SourceKind::Dotmed,
    default_base_url: "https://www.dotmed.com",
    search_path: "/search?q={query}",
    selectors: ListingSelectors {
        card: "div.listing-item, div.product-item, .search-result-item",
        title: "h3 a, .title a, h2 a",
        link: "h3 a, .title a, h2 a",
        price: ".price, .cost, .amount",
        condition: ".condition, .status",
        location: ".location, .seller-location",
        image: "img",
        skip_titles: &[],
    },
};

/// The built-in profile for a source kind
pub fn profile_for(kind: SourceKind) -> &'static SiteProfile {
    match kind {
        SourceKind::Ebay => &EBAY,
        SourceKind::Labx => &LABX,
        SourceKind::Govdeals => &GOVDEALS,
        SourceKind::Bidspotter => &BIDSPOTTER,
        SourceKind::Dotmed => &DOTMED,
    }
}

/// Generic worker for sites that serve an HTML results page
///
/// HTTP clients are cached per evasion level so cookies persist between
/// crawls, except for strategies that demand a fresh session, which get a
/// new client every time.
pub struct MarketplaceWorker {
    name: String,
    profile: &'static SiteProfile,
    base_url: Url,
    proxy_url: Option<String>,
    clients: Mutex<HashMap<EvasionLevel, Client>>,
}

impl MarketplaceWorker {
    /// Creates a worker for a profile
    ///
    /// # Arguments
    ///
    /// * `name` - Name the source is tracked under
    /// * `profile` - Site profile to crawl with
    /// * `base_url` - Overrides the profile's base URL (mirrors, test servers)
    /// * `proxy_url` - Forward proxy for strategies that require one
    pub fn new(
        name: impl Into<String>,
        profile: &'static SiteProfile,
        base_url: Option<&str>,
        proxy_url: Option<String>,
    ) -> Result<Self, UrlError> {
        let base = base_url.unwrap_or(profile.default_base_url);
        let base_url = Url::parse(base).map_err(|e| UrlError::Parse(format!("{}: {}", base, e)))?;

        Ok(Self {
            name: name.into(),
            profile,
            base_url,
            proxy_url,
            clients: Mutex::new(HashMap::new()),
        })
    }

    /// The search page URL for a query
    pub fn search_url(&self, query: &str) -> Result<Url, UrlError> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
        let path = self.profile.search_path.replace(QUERY_PLACEHOLDER, &encoded);
        resolve_href(&self.base_url, &path)
    }

    fn client_for(&self, strategy: &EvasionStrategy) -> Result<Client, WorkerError> {
        if strategy.fresh_session {
            return build_client(strategy, self.proxy_url.as_deref(), &self.name);
        }

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&strategy.level) {
            return Ok(client.clone());
        }

        let client = build_client(strategy, self.proxy_url.as_deref(), &self.name)?;
        clients.insert(strategy.level, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl SourceWorker for MarketplaceWorker {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn crawl(
        &self,
        query: &str,
        strategy: &EvasionStrategy,
        deadline: Instant,
    ) -> Result<Vec<RawListing>, WorkerError> {
        let think_time = strategy.think_time();
        if !think_time.is_zero() {
            tracing::debug!(source = %self.name, "Waiting {:?} before request", think_time);
            tokio::time::sleep(think_time).await;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(WorkerError::Timeout {
                source_name: self.name.clone(),
                after: think_time,
            });
        }

        let url = self.search_url(query).map_err(|e| WorkerError::Connection {
            source_name: self.name.clone(),
            message: e.to_string(),
        })?;
        let client = self.client_for(strategy)?;

        tracing::debug!(
            source = %self.name,
            level = strategy.level.as_u8(),
            "Fetching {}",
            url
        );
        let page = fetch_page(&client, &url, identity_headers(strategy), remaining, &self.name).await?;

        let listings = extract_listings(
            &page.body,
            &page.final_url,
            &self.profile.selectors,
            &self.name,
        )?;

        tracing::debug!(
            source = %self.name,
            "Extracted {} listings from {}",
            listings.len(),
            page.final_url
        );
        Ok(listings)
    }
}

/// Builds a worker for every enabled source in the configuration
pub fn build_workers(config: &Config) -> Result<Vec<Arc<dyn SourceWorker>>, SweepError> {
    config
        .enabled_sources()
        .map(|entry| -> Result<Arc<dyn SourceWorker>, SweepError> {
            let worker = MarketplaceWorker::new(
                entry.name.clone(),
                profile_for(entry.kind),
                entry.base_url.as_deref(),
                config.crawler.proxy_url.clone(),
            )?;
            Ok(Arc::new(worker))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_urls() {
        let ebay = MarketplaceWorker::new("eBay", &EBAY, None, None).unwrap();
        assert_eq!(
            ebay.search_url("Candela GentleMax").unwrap().as_str(),
            "https://www.ebay.com/sch/i.html?_nkw=Candela+GentleMax"
        );

        let govdeals = MarketplaceWorker::new("GovDeals", &GOVDEALS, None, None).unwrap();
        assert_eq!(
            govdeals.search_url("laser & light").unwrap().as_str(),
            "https://www.govdeals.com/index.cfm?fa=Main.Search&searchtype=1&searchterm=laser+%26+light"
        );
    }

    #[test]
    fn test_base_url_override() {
        let worker =
            MarketplaceWorker::new("LabX", &LABX, Some("http://127.0.0.1:9000"), None).unwrap();
        assert_eq!(
            worker.search_url("sciton").unwrap().as_str(),
            "http://127.0.0.1:9000/search?q=sciton"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(MarketplaceWorker::new("LabX", &LABX, Some("not a url"), None).is_err());
    }

    #[test]
    fn test_profiles_cover_every_kind() {
        for kind in SourceKind::ALL {
            assert_eq!(profile_for(kind).kind, kind);
        }
    }

    #[test]
    fn test_client_cache_respects_fresh_session() {
        use crate::tracker::strategy_for_level;

        let worker = MarketplaceWorker::new("eBay", &EBAY, None, None).unwrap();
        let low = strategy_for_level(EvasionLevel::Low);
        let high = strategy_for_level(EvasionLevel::High);

        worker.client_for(&low).unwrap();
        worker.client_for(&low).unwrap();
        worker.client_for(&high).unwrap();

        let clients = worker.clients.lock().unwrap();
        assert_eq!(clients.len(), 1);
        assert!(clients.contains_key(&EvasionLevel::Low));
    }

    #[test]
    fn test_build_workers_skips_disabled() {
        let config = crate::config::parse_config(
            r#"
[crawler]
pool-size = 3
worker-timeout-ms = 1000
global-deadline-ms = 2000

[output]
database-path = "db.sqlite"
metrics-path = "metrics.json"

[[source]]
name = "eBay"
kind = "ebay"

[[source]]
name = "LabX"
kind = "labx"
enabled = false
"#,
        )
        .unwrap();

        let workers = build_workers(&config).unwrap();
        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].source_name(), "eBay");
    }
}
