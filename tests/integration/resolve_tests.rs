//! Integration tests for the fallback resolver
//!
//! These tests wire the resolver to fake workers and an in-memory listings
//! database and check which tier answers each mode.

use async_trait::async_trait;
use chrono::Utc;
use gear_sweep::crawler::{DispatchSettings, Dispatcher};
use gear_sweep::storage::{ListingStore, SearchRecord, SqliteListingStore, StorageError, StorageResult};
use gear_sweep::synthetic::SYNTHETIC_SOURCE;
use gear_sweep::{
    CrawlMode, CrawlRequest, EvasionStrategy, FallbackResolver, NormalizedListing, Normalizer,
    RawListing, ResultTier, SourceTracker, SourceWorker, SweepError, WorkerError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Worker returning a fixed set of listings and counting its crawls
struct ScriptedWorker {
    name: &'static str,
    listings: Vec<RawListing>,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceWorker for ScriptedWorker {
    fn source_name(&self) -> &str {
        self.name
    }

    async fn crawl(
        &self,
        _query: &str,
        _strategy: &EvasionStrategy,
        _deadline: Instant,
    ) -> Result<Vec<RawListing>, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(WorkerError::Connection {
                source_name: self.name.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.listings.clone())
    }
}

/// Store whose every operation fails
struct BrokenStore;

impl ListingStore for BrokenStore {
    fn lookup_by_query(&self, _query: &str, _limit: usize) -> StorageResult<Vec<NormalizedListing>> {
        Err(StorageError::Database("disk I/O error".to_string()))
    }

    fn upsert_many(&self, _listings: &[NormalizedListing]) -> StorageResult<usize> {
        Err(StorageError::Database("disk I/O error".to_string()))
    }

    fn record_search(&self, _query: &str, _mode: &str, _tier: &str, _count: usize) -> StorageResult<()> {
        Err(StorageError::Database("disk I/O error".to_string()))
    }

    fn recent_searches(&self, _limit: usize) -> StorageResult<Vec<SearchRecord>> {
        Err(StorageError::Database("disk I/O error".to_string()))
    }
}

fn labx_listing(title: &str, price: &str, id: usize) -> RawListing {
    RawListing::new("LabX", title, format!("https://www.labx.com/item/{}", id)).with_price(price)
}

fn dispatcher(listings: Vec<RawListing>, fail: bool, calls: &Arc<AtomicUsize>) -> Arc<Dispatcher> {
    let worker = ScriptedWorker {
        name: "LabX",
        listings,
        fail,
        calls: Arc::clone(calls),
    };
    Arc::new(Dispatcher::new(
        Arc::new(SourceTracker::in_memory()),
        vec![Arc::new(worker)],
        DispatchSettings {
            pool_size: 2,
            worker_timeout: Duration::from_millis(500),
            global_deadline: Duration::from_secs(1),
        },
    ))
}

fn populated_store() -> Arc<SqliteListingStore> {
    let normalizer = Normalizer::new();
    let now = Utc::now();
    let raws = vec![
        labx_listing("Candela GentleMax Pro", "$38,000", 1),
        labx_listing("Candela GentleMax Pro Plus", "$52,000", 2),
        labx_listing("Candela GentleMax", "$14,500", 3),
        labx_listing("Candela GentleMax Pro 2019", "$29,000", 4),
        labx_listing("Candela GentleMax Pro", "$61,000", 5),
        labx_listing("Candela GentleMax Pro", "$85,000", 6),
        labx_listing("Candela GentleMax Pro", "$4,500", 7),
        labx_listing("Candela Vbeam Perfecta", "$31,000", 8),
        labx_listing("Cutera Excel V", "$30,000", 9),
    ];
    let listings = normalizer.normalize_all(&raws, now);

    let store = SqliteListingStore::new_in_memory().unwrap();
    store.upsert_many(&listings).unwrap();
    Arc::new(store)
}

fn request(query: &str, limit: usize, mode: CrawlMode) -> CrawlRequest {
    CrawlRequest::new(query, limit, mode, None).unwrap()
}

#[tokio::test]
async fn test_auto_serves_populated_store() {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = FallbackResolver::new(Normalizer::new())
        .with_dispatcher(dispatcher(Vec::new(), false, &calls))
        .with_store(populated_store());

    let response = resolver
        .resolve(&request("Candela GentleMax", 5, CrawlMode::Auto))
        .await
        .unwrap();

    assert_eq!(response.source, ResultTier::Database);
    assert_eq!(response.source.as_str(), "database");
    assert_eq!(response.total, 5);
    assert!(response.results.len() <= 5);
    for pair in response.results.windows(2) {
        assert!(pair[0].score_overall >= pair[1].score_overall);
    }
    assert!(response
        .results
        .iter()
        .all(|l| l.title.contains("GentleMax")));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_mock_never_dispatches() {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = FallbackResolver::new(Normalizer::new())
        .with_dispatcher(dispatcher(vec![labx_listing("Aerolase Neo", "$20,000", 1)], false, &calls))
        .with_store(populated_store());

    let response = resolver
        .resolve(&request("Aerolase", 6, CrawlMode::Mock))
        .await
        .unwrap();

    assert_eq!(response.source, ResultTier::Mock);
    assert_eq!(response.total, 6);
    assert!(response.results.iter().all(|l| l.brand == "Aerolase"));
    assert!(response.results.iter().all(|l| l.source == SYNTHETIC_SOURCE));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_real_with_nothing_is_empty_and_tagged() {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = FallbackResolver::new(Normalizer::new())
        .with_dispatcher(dispatcher(Vec::new(), true, &calls))
        .with_store(Arc::new(SqliteListingStore::new_in_memory().unwrap()));

    let response = resolver
        .resolve(&request("Sciton Joule", 10, CrawlMode::Real))
        .await
        .unwrap();

    assert_eq!(response.source, ResultTier::None);
    assert!(response.results.is_empty());
    assert_eq!(response.total, 0);
    assert!(response.reason.as_deref().unwrap().contains("no real data"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.sources.len(), 1);
}

#[tokio::test]
async fn test_real_prefers_live_crawl_and_persists() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(SqliteListingStore::new_in_memory().unwrap());
    let resolver = FallbackResolver::new(Normalizer::new())
        .with_dispatcher(dispatcher(
            vec![
                labx_listing("Sciton Joule", "$60,000", 1),
                labx_listing("Sciton Joule X", "$75,000", 2),
            ],
            false,
            &calls,
        ))
        .with_store(Arc::clone(&store) as Arc<dyn ListingStore>);

    let response = resolver
        .resolve(&request("Sciton", 10, CrawlMode::Real))
        .await
        .unwrap();

    assert_eq!(response.source, ResultTier::LiveCrawl);
    assert_eq!(response.total, 2);
    assert_eq!(store.lookup_by_query("sciton", 10).unwrap().len(), 2);

    // A later auto request is answered from what the crawl stored
    let response = resolver
        .resolve(&request("Sciton", 10, CrawlMode::Auto))
        .await
        .unwrap();
    assert_eq!(response.source, ResultTier::Database);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_real_falls_back_to_database() {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = FallbackResolver::new(Normalizer::new())
        .with_dispatcher(dispatcher(Vec::new(), true, &calls))
        .with_store(populated_store());

    let response = resolver
        .resolve(&request("Cutera", 10, CrawlMode::Real))
        .await
        .unwrap();

    assert_eq!(response.source, ResultTier::Database);
    assert_eq!(response.total, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_auto_falls_through_to_synthetic() {
    let calls = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(SqliteListingStore::new_in_memory().unwrap());
    let resolver = FallbackResolver::new(Normalizer::new())
        .with_dispatcher(dispatcher(Vec::new(), true, &calls))
        .with_store(Arc::clone(&store) as Arc<dyn ListingStore>);

    let response = resolver
        .resolve(&request("Lumenis M22", 4, CrawlMode::Auto))
        .await
        .unwrap();

    assert_eq!(response.source, ResultTier::Mock);
    assert_eq!(response.total, 4);
    assert!(response.results.iter().all(|l| l.brand == "Lumenis"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    // Synthetic listings are never stored
    assert_eq!(store.count_listings().unwrap(), 0);
}

#[tokio::test]
async fn test_price_ceiling_applies_to_stored_listings() {
    let resolver = FallbackResolver::new(Normalizer::new()).with_store(populated_store());
    let request = CrawlRequest::new("Candela", 20, CrawlMode::Auto, Some(30_000.0)).unwrap();

    let response = resolver.resolve(&request).await.unwrap();

    assert_eq!(response.source, ResultTier::Database);
    assert_eq!(response.total, 3);
    assert!(response
        .results
        .iter()
        .all(|l| l.price.map_or(true, |p| p <= 30_000.0)));
}

#[tokio::test]
async fn test_broken_store_degrades_to_next_tier() {
    let calls = Arc::new(AtomicUsize::new(0));
    let resolver = FallbackResolver::new(Normalizer::new())
        .with_dispatcher(dispatcher(
            vec![labx_listing("Candela GentleLase", "$18,000", 1)],
            false,
            &calls,
        ))
        .with_store(Arc::new(BrokenStore));

    let response = resolver
        .resolve(&request("Candela", 10, CrawlMode::Auto))
        .await
        .unwrap();

    assert_eq!(response.source, ResultTier::LiveCrawl);
    assert_eq!(response.total, 1);
}

#[tokio::test]
async fn test_searches_are_recorded() {
    let store = populated_store();
    let resolver = FallbackResolver::new(Normalizer::new())
        .with_store(Arc::clone(&store) as Arc<dyn ListingStore>);

    resolver
        .resolve(&request("Candela", 3, CrawlMode::Auto))
        .await
        .unwrap();
    resolver
        .resolve(&request("Aerolase", 2, CrawlMode::Mock))
        .await
        .unwrap();

    let history = store.recent_searches(10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].query, "Aerolase");
    assert_eq!(history[0].tier, "mock");
    assert_eq!(history[1].mode, "auto");
    assert_eq!(history[1].tier, "database");
    assert_eq!(history[1].result_count, 3);
}

#[test]
fn test_invalid_requests_fail_fast() {
    assert!(matches!(
        CrawlRequest::new("", 5, CrawlMode::Auto, None),
        Err(SweepError::InvalidRequest(_))
    ));
    assert!(matches!(
        CrawlRequest::new("Candela", 0, CrawlMode::Auto, None),
        Err(SweepError::InvalidRequest(_))
    ));
}
