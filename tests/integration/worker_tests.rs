//! Integration tests for the reference source workers
//!
//! These tests use wiremock to serve search result pages in each site's
//! markup and check extraction, block detection and timeouts end-to-end.

use gear_sweep::config::parse_config;
use gear_sweep::crawler::{MarketplaceWorker, SiteProfile, BIDSPOTTER, DOTMED, EBAY, GOVDEALS, LABX};
use gear_sweep::tracker::strategy_for_level;
use gear_sweep::{
    CrawlMode, CrawlRequest, EvasionLevel, EvasionStrategy, FallbackResolver, ResultTier,
    SourceTracker, SourceWorker, WorkerError,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LABX_PAGE: &str = r#"
<html><body>
  <div class="listing-item">
    <h3><a href="/item/101">Candela GentleMax Pro</a></h3>
    <span class="price">$42,000</span>
    <span class="condition">Refurbished</span>
    <span class="location">Dallas, TX</span>
    <img src="/img/101.jpg">
  </div>
  <div class="listing-item">
    <h3><a href="/item/102">Candela GentleLase</a></h3>
    <span class="price">Call for price</span>
  </div>
</body></html>
"#;

const EBAY_PAGE: &str = r#"
<html><body><ul>
  <li class="s-item">
    <div class="s-item__title">Shop on eBay</div>
    <a class="s-item__link" href="https://www.ebay.com/itm/123456">x</a>
  </li>
  <li class="s-item">
    <a class="s-item__link" href="/itm/998877?_trksid=p2380057">
      <div class="s-item__title">Cutera Excel V Laser</div>
    </a>
    <span class="s-item__price">$31,500.00</span>
    <span class="s-item__location">from Phoenix, AZ</span>
  </li>
</ul></body></html>
"#;

const GOVDEALS_PAGE: &str = r#"
<div class="auction-item">
  <h2><a href="/asset/55/county-health">Lumenis M22 IPL System</a></h2>
  <span class="current-bid">$2,150</span>
  <span class="agency-location">Tulsa, OK</span>
</div>
"#;

const BIDSPOTTER_PAGE: &str = r#"
<div class="lot-item">
  <div class="lot-title"><a href="/en-us/lot/77">Sciton Joule Platform</a></div>
  <span class="estimate">$18,000 - $22,000</span>
</div>
"#;

const DOTMED_PAGE: &str = r#"
<div class="search-result-item">
  <div class="title"><a href="/listing/lasers/9001">Fotona SP Dynamis</a></div>
  <span class="amount">$95,000</span>
  <span class="status">Used - Excellent</span>
</div>
"#;

fn fast_strategy(level: EvasionLevel) -> EvasionStrategy {
    strategy_for_level(level).without_delay()
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

async fn serve(server: &MockServer, page_path: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(template)
        .mount(server)
        .await;
}

fn worker(name: &str, profile: &'static SiteProfile, server: &MockServer) -> MarketplaceWorker {
    MarketplaceWorker::new(name, profile, Some(&server.uri()), None).unwrap()
}

#[tokio::test]
async fn test_labx_results_are_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "candela gentlemax"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LABX_PAGE))
        .mount(&server)
        .await;

    let labx = worker("LabX", &LABX, &server);
    let listings = labx
        .crawl("candela gentlemax", &fast_strategy(EvasionLevel::Low), deadline())
        .await
        .unwrap();

    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].title, "Candela GentleMax Pro");
    assert_eq!(listings[0].url, format!("{}/item/101", server.uri()));
    assert_eq!(listings[0].price_text.as_deref(), Some("$42,000"));
    assert_eq!(listings[0].condition_text.as_deref(), Some("Refurbished"));
    assert_eq!(listings[0].image_urls, vec![format!("{}/img/101.jpg", server.uri())]);
    assert_eq!(listings[1].price_text.as_deref(), Some("Call for price"));
    assert!(listings.iter().all(|l| l.source_name == "LabX"));
}

#[tokio::test]
async fn test_ebay_placeholder_cards_are_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sch/i.html"))
        .and(query_param("_nkw", "cutera"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EBAY_PAGE))
        .mount(&server)
        .await;

    let ebay = worker("eBay", &EBAY, &server);
    let listings = ebay
        .crawl("cutera", &fast_strategy(EvasionLevel::Medium), deadline())
        .await
        .unwrap();

    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].title, "Cutera Excel V Laser");
    assert_eq!(listings[0].price_text.as_deref(), Some("$31,500.00"));
    assert_eq!(listings[0].location_text.as_deref(), Some("from Phoenix, AZ"));
}

#[tokio::test]
async fn test_surplus_and_auction_profiles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.cfm"))
        .and(query_param("searchterm", "lumenis"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GOVDEALS_PAGE))
        .mount(&server)
        .await;
    serve(&server, "/en-us/search", ResponseTemplate::new(200).set_body_string(BIDSPOTTER_PAGE)).await;
    serve(&server, "/search", ResponseTemplate::new(200).set_body_string(DOTMED_PAGE)).await;

    let strategy = fast_strategy(EvasionLevel::Low);

    let govdeals = worker("GovDeals", &GOVDEALS, &server)
        .crawl("lumenis", &strategy, deadline())
        .await
        .unwrap();
    assert_eq!(govdeals.len(), 1);
    assert_eq!(govdeals[0].price_text.as_deref(), Some("$2,150"));
    assert_eq!(govdeals[0].location_text.as_deref(), Some("Tulsa, OK"));

    let bidspotter = worker("BidSpotter", &BIDSPOTTER, &server)
        .crawl("sciton", &strategy, deadline())
        .await
        .unwrap();
    assert_eq!(bidspotter.len(), 1);
    assert_eq!(bidspotter[0].title, "Sciton Joule Platform");
    assert_eq!(bidspotter[0].url, format!("{}/en-us/lot/77", server.uri()));

    let dotmed = worker("DOTmed Auctions", &DOTMED, &server)
        .crawl("fotona", &strategy, deadline())
        .await
        .unwrap();
    assert_eq!(dotmed.len(), 1);
    assert_eq!(dotmed[0].condition_text.as_deref(), Some("Used - Excellent"));
}

#[tokio::test]
async fn test_forbidden_and_rate_limited_are_blocks() {
    for status in [403u16, 429] {
        let server = MockServer::start().await;
        serve(&server, "/search", ResponseTemplate::new(status)).await;

        let result = worker("LabX", &LABX, &server)
            .crawl("laser", &fast_strategy(EvasionLevel::Low), deadline())
            .await;

        match result {
            Err(e) => assert!(e.is_block(), "status {} gave {}", status, e),
            Ok(_) => panic!("status {} should fail", status),
        }
    }
}

#[tokio::test]
async fn test_server_error_is_a_plain_failure() {
    let server = MockServer::start().await;
    serve(&server, "/search", ResponseTemplate::new(503)).await;

    let result = worker("LabX", &LABX, &server)
        .crawl("laser", &fast_strategy(EvasionLevel::Low), deadline())
        .await;

    assert!(matches!(result, Err(WorkerError::HttpStatus { status: 503, .. })));
}

#[tokio::test]
async fn test_captcha_page_is_a_block() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/search",
        ResponseTemplate::new(200)
            .set_body_string("<html><body><h1>Are you a robot?</h1><div id='captcha'></div></body></html>"),
    )
    .await;

    let result = worker("LabX", &LABX, &server)
        .crawl("laser", &fast_strategy(EvasionLevel::High), deadline())
        .await;

    assert!(matches!(result, Err(WorkerError::Blocked { .. })));
}

#[tokio::test]
async fn test_no_results_is_empty_not_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/search",
        ResponseTemplate::new(200).set_body_string("<html><body><p>0 results found</p></body></html>"),
    )
    .await;

    let listings = worker("LabX", &LABX, &server)
        .crawl("nothing matches", &fast_strategy(EvasionLevel::Low), deadline())
        .await
        .unwrap();

    assert!(listings.is_empty());
}

#[tokio::test]
async fn test_changed_markup_is_an_extraction_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/search",
        ResponseTemplate::new(200)
            .set_body_string(r#"<div class="listing-item"><span class="new-title">Candela</span></div>"#),
    )
    .await;

    let result = worker("LabX", &LABX, &server)
        .crawl("candela", &fast_strategy(EvasionLevel::Low), deadline())
        .await;

    assert!(matches!(result, Err(WorkerError::Extraction { .. })));
}

#[tokio::test]
async fn test_slow_source_times_out() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/search",
        ResponseTemplate::new(200)
            .set_body_string(LABX_PAGE)
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let started = Instant::now();
    let result = worker("LabX", &LABX, &server)
        .crawl(
            "candela",
            &fast_strategy(EvasionLevel::Low),
            Instant::now() + Duration::from_millis(300),
        )
        .await;

    assert!(matches!(result, Err(WorkerError::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_live_crawl_through_resolver() {
    let server = MockServer::start().await;
    serve(&server, "/search", ResponseTemplate::new(200).set_body_string(LABX_PAGE)).await;

    let dir = TempDir::new().unwrap();
    let config = parse_config(&format!(
        r#"
[crawler]
pool-size = 2
worker-timeout-ms = 8000
global-deadline-ms = 9000

[output]
database-path = "{db}"
metrics-path = "{metrics}"

[[source]]
name = "LabX"
kind = "labx"
base-url = "{base}"
"#,
        db = dir.path().join("listings.db").display(),
        metrics = dir.path().join("metrics.json").display(),
        base = server.uri(),
    ))
    .unwrap();

    let tracker = Arc::new(SourceTracker::in_memory());
    let resolver = FallbackResolver::from_config(&config, Arc::clone(&tracker)).unwrap();
    let request = CrawlRequest::new("candela", 10, CrawlMode::Real, None).unwrap();

    let response = resolver.resolve(&request).await.unwrap();

    assert_eq!(response.source, ResultTier::LiveCrawl);
    assert_eq!(response.total, 2);
    assert!(response.results.iter().all(|l| l.brand == "Candela"));
    assert_eq!(tracker.snapshot("LabX").unwrap().successful_requests, 1);

    let stored = resolver
        .store()
        .unwrap()
        .lookup_by_query("candela", 10)
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_ebay_page_with_only_placeholder_is_empty() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/sch/i.html",
        ResponseTemplate::new(200).set_body_string(
            r#"<ul><li class="s-item">
                 <div class="s-item__title">Shop on eBay</div>
                 <a class="s-item__link" href="https://www.ebay.com/itm/123456">x</a>
               </li></ul>"#,
        ),
    )
    .await;

    let listings = worker("eBay", &EBAY, &server)
        .crawl("zimmer cryo 9", &fast_strategy(EvasionLevel::Low), deadline())
        .await
        .unwrap();

    assert!(listings.is_empty());
}

#[tokio::test]
async fn test_search_text_never_reads_as_a_block() {
    let server = MockServer::start().await;
    serve(&server, "/search", ResponseTemplate::new(200).set_body_string(LABX_PAGE)).await;

    let listings = worker("LabX", &LABX, &server)
        .crawl(
            "candela blocked challenge handpiece",
            &fast_strategy(EvasionLevel::Low),
            deadline(),
        )
        .await
        .unwrap();

    assert_eq!(listings.len(), 2);
}
