//! Fallback resolver
//!
//! The entry point for a search. Depending on the request mode it answers
//! from stored listings, a live crawl or the synthetic generator, and tags
//! the response with the tier that produced it.
//!
//! | Mode | Tiers tried, in order |
//! |------|-----------------------|
//! | `auto` | database, live crawl, synthetic |
//! | `real` | live crawl, database; never synthetic |
//! | `mock` | synthetic only; never crawls |

use crate::config::Config;
use crate::crawler::{Dispatcher, SourceReport};
use crate::normalize::{NormalizedListing, Normalizer};
use crate::storage::{open_storage, ListingStore};
use crate::synthetic::SyntheticGenerator;
use crate::tracker::SourceTracker;
use crate::SweepError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Largest result count one request may ask for
pub const MAX_REQUEST_LIMIT: usize = 100;

/// How far the resolver may go to answer a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlMode {
    #[default]
    Auto,
    Mock,
    Real,
}

impl CrawlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Mock => "mock",
            Self::Real => "real",
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrawlMode {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "mock" => Ok(Self::Mock),
            "real" => Ok(Self::Real),
            other => Err(SweepError::InvalidRequest(format!(
                "unknown mode '{}', expected auto, mock or real",
                other
            ))),
        }
    }
}

/// A validated search request
///
/// Fields are only reachable through accessors so a request, once built,
/// always holds a non-empty query and a limit in `1..=100`.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlRequest {
    query: String,
    limit: usize,
    mode: CrawlMode,
    max_price: Option<f64>,
}

impl CrawlRequest {
    /// Validates and builds a request
    ///
    /// # Errors
    ///
    /// [`SweepError::InvalidRequest`] when the query is blank, the limit is
    /// zero or above [`MAX_REQUEST_LIMIT`], or the price ceiling is negative
    /// or not a number.
    pub fn new(
        query: impl Into<String>,
        limit: usize,
        mode: CrawlMode,
        max_price: Option<f64>,
    ) -> Result<Self, SweepError> {
        let query = query.into().trim().to_string();
        if query.is_empty() {
            return Err(SweepError::InvalidRequest("query must not be empty".to_string()));
        }
        if limit == 0 || limit > MAX_REQUEST_LIMIT {
            return Err(SweepError::InvalidRequest(format!(
                "limit must be between 1 and {}, got {}",
                MAX_REQUEST_LIMIT, limit
            )));
        }
        if let Some(price) = max_price {
            if !price.is_finite() || price < 0.0 {
                return Err(SweepError::InvalidRequest(format!(
                    "max price must be a non-negative number, got {}",
                    price
                )));
            }
        }

        Ok(Self {
            query,
            limit,
            mode,
            max_price,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn mode(&self) -> CrawlMode {
        self.mode
    }

    pub fn max_price(&self) -> Option<f64> {
        self.max_price
    }
}

/// Which tier produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultTier {
    Database,
    LiveCrawl,
    Mock,
    /// Every permitted tier came back empty
    None,
}

impl ResultTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::LiveCrawl => "live_crawl",
            Self::Mock => "mock",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ResultTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a search returns
#[derive(Debug, Clone, Serialize)]
pub struct ResolveResponse {
    pub query: String,
    pub results: Vec<NormalizedListing>,
    pub total: usize,
    /// The tier the results came from
    pub source: ResultTier,
    /// Why the results are empty, when they are
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Per-source outcomes, when a live crawl ran
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceReport>,
}

impl ResolveResponse {
    fn new(request: &CrawlRequest, source: ResultTier, results: Vec<NormalizedListing>) -> Self {
        Self {
            query: request.query.clone(),
            total: results.len(),
            results,
            source,
            reason: None,
            timestamp: Utc::now(),
            sources: Vec::new(),
        }
    }

    fn empty(request: &CrawlRequest, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(request, ResultTier::None, Vec::new())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Chooses between stored, live and synthetic listings for each request
pub struct FallbackResolver {
    dispatcher: Option<Arc<Dispatcher>>,
    store: Option<Arc<dyn ListingStore>>,
    normalizer: Normalizer,
    synthetic: SyntheticGenerator,
}

impl FallbackResolver {
    /// Resolver with no crawl or storage tier; only `mock` answers
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            dispatcher: None,
            store: None,
            normalizer,
            synthetic: SyntheticGenerator::new(),
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ListingStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_synthetic(mut self, synthetic: SyntheticGenerator) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Resolver wired to the configured sources and listings database
    ///
    /// A database that cannot be opened disables the storage tier instead of
    /// failing; worker construction errors are returned.
    pub fn from_config(config: &Config, tracker: Arc<SourceTracker>) -> Result<Self, SweepError> {
        let dispatcher = Dispatcher::from_config(config, tracker)?;
        let resolver =
            Self::new(Normalizer::from_config(config)).with_dispatcher(Arc::new(dispatcher));

        match open_storage(Path::new(&config.output.database_path)) {
            Ok(store) => Ok(resolver.with_store(Arc::new(store))),
            Err(e) => {
                tracing::warn!(
                    "Listings database {} unavailable, storage tier disabled: {}",
                    config.output.database_path,
                    e
                );
                Ok(resolver)
            }
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn store(&self) -> Option<&Arc<dyn ListingStore>> {
        self.store.as_ref()
    }

    pub fn dispatcher(&self) -> Option<&Arc<Dispatcher>> {
        self.dispatcher.as_ref()
    }

    /// Answers one search request
    ///
    /// Tier failures (a blocked source, an unavailable database) never fail
    /// the request; they push the resolver on to the next tier. A request no
    /// tier can answer returns an empty response tagged [`ResultTier::None`]
    /// with a reason.
    pub async fn resolve(&self, request: &CrawlRequest) -> Result<ResolveResponse, SweepError> {
        tracing::info!(
            mode = %request.mode,
            limit = request.limit,
            "Resolving '{}'",
            request.query
        );

        let response = match request.mode {
            CrawlMode::Mock => self.mock_tier(request),
            CrawlMode::Real => {
                let (live, sources) = self.live_tier(request).await;
                let mut response = if !live.is_empty() {
                    ResolveResponse::new(request, ResultTier::LiveCrawl, live)
                } else {
                    let stored = self.database_tier(request);
                    if !stored.is_empty() {
                        ResolveResponse::new(request, ResultTier::Database, stored)
                    } else {
                        ResolveResponse::empty(
                            request,
                            "no real data: the live crawl and stored listings returned nothing",
                        )
                    }
                };
                response.sources = sources;
                response
            }
            CrawlMode::Auto => {
                let stored = self.database_tier(request);
                if !stored.is_empty() {
                    ResolveResponse::new(request, ResultTier::Database, stored)
                } else {
                    let (live, sources) = self.live_tier(request).await;
                    let mut response = if !live.is_empty() {
                        ResolveResponse::new(request, ResultTier::LiveCrawl, live)
                    } else {
                        tracing::warn!(
                            "No stored or live listings for '{}', falling back to synthetic data",
                            request.query
                        );
                        self.mock_tier(request)
                    };
                    response.sources = sources;
                    response
                }
            }
        };

        self.record_search(request, &response);
        tracing::info!(
            tier = %response.source,
            "Resolved '{}' with {} listings",
            request.query,
            response.total
        );
        Ok(response)
    }

    fn mock_tier(&self, request: &CrawlRequest) -> ResolveResponse {
        let generated = self
            .synthetic
            .generate(&request.query, request.limit, &self.normalizer);
        let results = self
            .normalizer
            .finalize(generated, request.max_price, request.limit);

        if results.is_empty() {
            ResolveResponse::empty(request, "no synthetic listings under the price ceiling")
        } else {
            ResolveResponse::new(request, ResultTier::Mock, results)
        }
    }

    fn database_tier(&self, request: &CrawlRequest) -> Vec<NormalizedListing> {
        let Some(store) = &self.store else {
            return Vec::new();
        };

        // Over-fetch so the price ceiling can still fill the limit
        let lookup_limit = request.limit.saturating_mul(4);
        match store.lookup_by_query(&request.query, lookup_limit) {
            Ok(stored) => {
                tracing::debug!("Database tier found {} stored listings", stored.len());
                self.normalizer
                    .finalize(stored, request.max_price, request.limit)
            }
            Err(e) => {
                tracing::warn!("{}", SweepError::PersistenceUnavailable(e));
                Vec::new()
            }
        }
    }

    async fn live_tier(&self, request: &CrawlRequest) -> (Vec<NormalizedListing>, Vec<SourceReport>) {
        let Some(dispatcher) = &self.dispatcher else {
            tracing::debug!("No dispatcher configured, skipping live crawl");
            return (Vec::new(), Vec::new());
        };

        let report = dispatcher.dispatch_all(&request.query, request.limit).await;
        let listings = self.normalizer.normalize_all(&report.listings, Utc::now());

        if !listings.is_empty() {
            if let Some(store) = &self.store {
                match store.upsert_many(&listings) {
                    Ok(written) => tracing::debug!("Stored {} crawled listings", written),
                    Err(e) => tracing::warn!(
                        "Crawled listings not stored: {}",
                        SweepError::PersistenceUnavailable(e)
                    ),
                }
            }
        }

        let results = self
            .normalizer
            .finalize(listings, request.max_price, request.limit);
        (results, report.outcomes)
    }

    fn record_search(&self, request: &CrawlRequest, response: &ResolveResponse) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.record_search(
            &request.query,
            request.mode.as_str(),
            response.source.as_str(),
            response.total,
        ) {
            tracing::warn!("Search history not recorded: {}", e);
        }
    }
}
