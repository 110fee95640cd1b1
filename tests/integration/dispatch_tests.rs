//! Integration tests for the crawl dispatcher
//!
//! These tests drive the dispatcher with fake workers that succeed, fail,
//! get blocked or hang, and check what reaches the caller and the tracker.

use async_trait::async_trait;
use gear_sweep::crawler::{DispatchSettings, Dispatcher, SourceOutcome};
use gear_sweep::{EvasionLevel, EvasionStrategy, RawListing, SourceTracker, SourceWorker};
use gear_sweep::WorkerError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

/// What a fake worker does when crawled
#[derive(Clone)]
enum Behavior {
    Return(usize),
    ConnectionError,
    Block,
    Sleep(Duration),
}

struct FakeWorker {
    name: String,
    behavior: Behavior,
    levels_seen: Mutex<Vec<EvasionLevel>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeWorker {
    fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            levels_seen: Mutex::new(Vec::new()),
            running: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn sharing_counters(name: &str, behavior: Behavior, running: &Arc<AtomicUsize>, peak: &Arc<AtomicUsize>) -> Self {
        Self {
            running: Arc::clone(running),
            peak: Arc::clone(peak),
            ..Self::new(name, behavior)
        }
    }
}

#[async_trait]
impl SourceWorker for FakeWorker {
    fn source_name(&self) -> &str {
        &self.name
    }

    async fn crawl(
        &self,
        _query: &str,
        strategy: &EvasionStrategy,
        _deadline: Instant,
    ) -> Result<Vec<RawListing>, WorkerError> {
        self.levels_seen.lock().unwrap().push(strategy.level);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_running, Ordering::SeqCst);

        let result = match &self.behavior {
            Behavior::Return(count) => Ok((0..*count)
                .map(|i| {
                    RawListing::new(
                        &self.name,
                        format!("Candela GentleMax Pro #{}", i),
                        format!("https://{}.test/item/{}", self.name.to_lowercase(), i),
                    )
                })
                .collect()),
            Behavior::ConnectionError => Err(WorkerError::Connection {
                source_name: self.name.clone(),
                message: "connection refused".to_string(),
            }),
            Behavior::Block => Err(WorkerError::Blocked {
                source_name: self.name.clone(),
                reason: "HTTP 403".to_string(),
            }),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(vec![RawListing::new(&self.name, "Late", "https://late.test/1")])
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn settings(pool_size: usize, worker_timeout_ms: u64, global_deadline_ms: u64) -> DispatchSettings {
    DispatchSettings {
        pool_size,
        worker_timeout: Duration::from_millis(worker_timeout_ms),
        global_deadline: Duration::from_millis(global_deadline_ms),
    }
}

fn workers(list: Vec<FakeWorker>) -> Vec<Arc<dyn SourceWorker>> {
    list.into_iter()
        .map(|w| Arc::new(w) as Arc<dyn SourceWorker>)
        .collect()
}

#[tokio::test]
async fn test_partial_failure_returns_successful_union() {
    let tracker = Arc::new(SourceTracker::in_memory());
    let dispatcher = Dispatcher::new(
        Arc::clone(&tracker),
        workers(vec![
            FakeWorker::new("eBay", Behavior::Return(2)),
            FakeWorker::new("LabX", Behavior::ConnectionError),
            FakeWorker::new("GovDeals", Behavior::Return(3)),
            FakeWorker::new("BidSpotter", Behavior::ConnectionError),
            FakeWorker::new("DOTmed Auctions", Behavior::Return(1)),
        ]),
        settings(3, 1_000, 2_000),
    );

    let report = dispatcher.dispatch_all("candela", 50).await;

    assert_eq!(report.listings.len(), 6);
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.succeeded(), 3);

    let metrics = tracker.all_metrics();
    let successes: u64 = metrics.values().map(|m| m.successful_requests).sum();
    let failures: u64 = metrics.values().map(|m| m.failed_requests).sum();
    assert_eq!(successes, 3);
    assert_eq!(failures, 2);

    assert!(matches!(
        report.outcome_for("LabX"),
        Some(SourceOutcome::Failed { .. })
    ));
    assert_eq!(
        report.outcome_for("GovDeals"),
        Some(&SourceOutcome::Succeeded { items: 3 })
    );
    assert_eq!(tracker.snapshot("GovDeals").unwrap().items_found, 3);
}

#[tokio::test]
async fn test_worker_timeout_does_not_hold_dispatch() {
    let tracker = Arc::new(SourceTracker::in_memory());
    let dispatcher = Dispatcher::new(
        Arc::clone(&tracker),
        workers(vec![
            FakeWorker::new("Slow", Behavior::Sleep(Duration::from_secs(10))),
            FakeWorker::new("Fast", Behavior::Return(1)),
        ]),
        settings(2, 200, 1_000),
    );

    let started = std::time::Instant::now();
    let report = dispatcher.dispatch_all("laser", 10).await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(1_000 + 500), "took {:?}", elapsed);
    assert_eq!(report.outcome_for("Slow"), Some(&SourceOutcome::TimedOut));
    assert_eq!(report.listings.len(), 1);

    let slow = tracker.snapshot("Slow").unwrap();
    assert_eq!(slow.failed_requests, 1);
    assert_eq!(slow.successful_requests, 0);
}

#[tokio::test]
async fn test_global_deadline_cancels_running_workers() {
    let tracker = Arc::new(SourceTracker::in_memory());
    let dispatcher = Dispatcher::new(
        Arc::clone(&tracker),
        workers(vec![
            FakeWorker::new("Hung", Behavior::Sleep(Duration::from_secs(30))),
            FakeWorker::new("Quick", Behavior::Return(2)),
        ]),
        settings(2, 20_000, 300),
    );

    let started = std::time::Instant::now();
    let report = dispatcher.dispatch_all("laser", 10).await;

    assert!(started.elapsed() < Duration::from_millis(300 + 500));
    // The worker's own deadline is capped at the global one, so either timer may fire first
    assert!(matches!(
        report.outcome_for("Hung"),
        Some(SourceOutcome::Cancelled) | Some(SourceOutcome::TimedOut)
    ));
    assert_eq!(report.listings.len(), 2);
    assert_eq!(tracker.snapshot("Hung").unwrap().failed_requests, 1);
}

#[tokio::test]
async fn test_blocks_escalate_and_saturate() {
    let tracker = Arc::new(SourceTracker::in_memory());
    let blocked = Arc::new(FakeWorker::new("eBay", Behavior::Block));
    let dispatcher = Dispatcher::new(
        Arc::clone(&tracker),
        vec![Arc::clone(&blocked) as Arc<dyn SourceWorker>],
        settings(1, 1_000, 2_000),
    );

    for _ in 0..4 {
        let report = dispatcher.dispatch_all("laser", 10).await;
        assert!(matches!(
            report.outcome_for("eBay"),
            Some(SourceOutcome::Blocked { .. })
        ));
    }

    let metrics = tracker.snapshot("eBay").unwrap();
    assert_eq!(metrics.block_count, 4);
    assert_eq!(metrics.evasion_level, EvasionLevel::High);

    // Each crawl ran with the level the previous blocks had earned
    let seen = blocked.levels_seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            EvasionLevel::Low,
            EvasionLevel::Medium,
            EvasionLevel::High,
            EvasionLevel::High
        ]
    );
}

#[tokio::test]
async fn test_pool_bounds_concurrency() {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let list = (0..6)
        .map(|i| {
            FakeWorker::sharing_counters(
                &format!("Source{}", i),
                Behavior::Sleep(Duration::from_millis(100)),
                &running,
                &peak,
            )
        })
        .collect();

    let dispatcher = Dispatcher::new(
        Arc::new(SourceTracker::in_memory()),
        workers(list),
        settings(2, 2_000, 5_000),
    );

    let report = dispatcher.dispatch_all("laser", 10).await;
    assert_eq!(report.succeeded(), 6);
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_tracker_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("source_metrics.json");

    {
        let tracker = Arc::new(SourceTracker::open(&path));
        let dispatcher = Dispatcher::new(
            Arc::clone(&tracker),
            workers(vec![
                FakeWorker::new("LabX", Behavior::Return(4)),
                FakeWorker::new("GovDeals", Behavior::Block),
            ]),
            settings(2, 1_000, 2_000),
        );
        dispatcher.dispatch_all("laser", 10).await;
    }

    let reopened = SourceTracker::open(&path);
    let labx = reopened.snapshot("LabX").unwrap();
    assert_eq!(labx.successful_requests, 1);
    assert_eq!(labx.items_found, 4);
    assert_eq!(
        reopened.snapshot("GovDeals").unwrap().evasion_level,
        EvasionLevel::Medium
    );
}
