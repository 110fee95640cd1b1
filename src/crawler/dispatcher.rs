//! Crawl dispatcher
//!
//! Fans one query out to every source worker in a bounded pool, with a
//! timeout per worker and a deadline for the whole dispatch. Each settled
//! worker is reported to the [`SourceTracker`]; one source failing never
//! stops or delays the others.

use crate::config::Config;
use crate::crawler::sites::build_workers;
use crate::crawler::worker::{RawListing, SourceWorker};
use crate::tracker::SourceTracker;
use crate::{SweepError, WorkerError};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

/// Pool and deadline settings for dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Maximum number of workers running at once
    pub pool_size: usize,
    /// Time one worker may take once it has a pool slot
    pub worker_timeout: Duration,
    /// Time the whole dispatch may take
    pub global_deadline: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pool_size: config.crawler.pool_size as usize,
            worker_timeout: config.crawler.worker_timeout(),
            global_deadline: config.crawler.global_deadline(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            pool_size: 3,
            worker_timeout: Duration::from_secs(25),
            global_deadline: Duration::from_secs(30),
        }
    }
}

/// How one source's crawl ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Succeeded { items: usize },
    Failed { reason: String },
    Blocked { reason: String },
    /// The per-worker timeout fired
    TimedOut,
    /// Still running (or crashed) when the dispatch ended
    Cancelled,
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// One source's line in a dispatch report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub outcome: SourceOutcome,
    pub elapsed: Duration,
}

/// Everything one dispatch produced
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Listings from every source that succeeded, in completion order
    pub listings: Vec<RawListing>,
    /// One entry per launched source, in settlement order
    pub outcomes: Vec<SourceReport>,
    pub elapsed: Duration,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    pub fn outcome_for(&self, source: &str) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.source == source)
            .map(|o| &o.outcome)
    }
}

/// Result a worker task hands back to the dispatcher
struct WorkerRun {
    index: usize,
    elapsed: Duration,
    result: Option<Result<Vec<RawListing>, WorkerError>>,
}

/// Runs source workers concurrently and reports their outcomes
pub struct Dispatcher {
    tracker: Arc<SourceTracker>,
    workers: Vec<Arc<dyn SourceWorker>>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        tracker: Arc<SourceTracker>,
        workers: Vec<Arc<dyn SourceWorker>>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            tracker,
            workers,
            settings: DispatchSettings {
                pool_size: settings.pool_size.max(1),
                ..settings
            },
        }
    }

    /// Dispatcher over the enabled sources of a configuration
    pub fn from_config(config: &Config, tracker: Arc<SourceTracker>) -> Result<Self, SweepError> {
        Ok(Self::new(
            tracker,
            build_workers(config)?,
            DispatchSettings::from_config(config),
        ))
    }

    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    pub fn tracker(&self) -> &Arc<SourceTracker> {
        &self.tracker
    }

    /// Names of every source this dispatcher can crawl
    pub fn source_names(&self) -> Vec<String> {
        self.workers
            .iter()
            .map(|w| w.source_name().to_string())
            .collect()
    }

    /// Crawls every source with the configured deadline
    pub async fn dispatch_all(&self, query: &str, limit: usize) -> DispatchReport {
        let sources = self.source_names();
        self.dispatch(query, &sources, limit, self.settings.global_deadline)
            .await
    }

    /// Crawls the named sources for `query`
    ///
    /// # Arguments
    ///
    /// * `query` - Search text handed to every worker
    /// * `sources` - Sources to crawl; unknown names are skipped with a warning
    /// * `limit` - Maximum listings taken from any single source
    /// * `global_deadline` - Time after which still-running workers are
    ///   cancelled and recorded as failures
    ///
    /// # Returns
    ///
    /// The listings of every source that succeeded, plus one outcome per
    /// launched source. Never fails: worker errors become tracker updates.
    pub async fn dispatch(
        &self,
        query: &str,
        sources: &[String],
        limit: usize,
        global_deadline: Duration,
    ) -> DispatchReport {
        let started = Instant::now();
        let deadline = started + global_deadline;

        let selected: Vec<Arc<dyn SourceWorker>> = sources
            .iter()
            .filter_map(|name| {
                let worker = self.workers.iter().find(|w| w.source_name() == name);
                if worker.is_none() {
                    tracing::warn!(source = %name, "No worker configured for source, skipping");
                }
                worker.cloned()
            })
            .collect();

        tracing::info!(
            "Dispatching '{}' to {} sources (pool {}, worker timeout {:?}, deadline {:?})",
            query,
            selected.len(),
            self.settings.pool_size,
            self.settings.worker_timeout,
            global_deadline
        );

        let pool = Arc::new(Semaphore::new(self.settings.pool_size));
        let mut tasks: JoinSet<WorkerRun> = JoinSet::new();

        for (index, worker) in selected.iter().enumerate() {
            let strategy = self.tracker.strategy_for(worker.source_name());
            let worker = Arc::clone(worker);
            let pool = Arc::clone(&pool);
            let query = query.to_string();
            let worker_timeout = self.settings.worker_timeout;

            tasks.spawn(async move {
                let _permit = match pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return WorkerRun {
                            index,
                            elapsed: Duration::ZERO,
                            result: Some(Err(WorkerError::Connection {
                                source_name: worker.source_name().to_string(),
                                message: "worker pool closed".to_string(),
                            })),
                        }
                    }
                };

                let crawl_started = Instant::now();
                let worker_deadline = (crawl_started + worker_timeout).min(deadline);
                let result = timeout_at(
                    worker_deadline,
                    worker.crawl(&query, &strategy, worker_deadline),
                )
                .await
                .ok();

                WorkerRun {
                    index,
                    elapsed: crawl_started.elapsed(),
                    result,
                }
            });
        }

        let mut report = DispatchReport::default();
        let mut settled: HashSet<usize> = HashSet::new();

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok(run))) => {
                    settled.insert(run.index);
                    let name = selected[run.index].source_name();
                    let outcome = self.settle(name, run, limit, &mut report.listings);
                    report.outcomes.push(outcome);
                }
                Ok(Some(Err(e))) => {
                    // Crashed workers are picked up with the unsettled ones below
                    tracing::error!("Source worker task failed: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        "Dispatch deadline of {:?} reached with {} sources still running",
                        global_deadline,
                        tasks.len()
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let elapsed = started.elapsed();
        for (index, worker) in selected.iter().enumerate() {
            if settled.contains(&index) {
                continue;
            }
            let name = worker.source_name();
            tracing::warn!(source = %name, "Cancelled before settling, recording failure");
            self.tracker
                .record_failure(name, Some(elapsed.as_secs_f64()));
            report.outcomes.push(SourceReport {
                source: name.to_string(),
                outcome: SourceOutcome::Cancelled,
                elapsed,
            });
        }

        report.elapsed = elapsed;
        tracing::info!(
            elapsed_ms = elapsed.as_millis() as u64,
            "Dispatch finished: {}/{} sources succeeded, {} listings",
            report.succeeded(),
            selected.len(),
            report.listings.len()
        );
        report
    }

    /// Reports one settled worker to the tracker and collects its listings
    fn settle(
        &self,
        name: &str,
        run: WorkerRun,
        limit: usize,
        listings: &mut Vec<RawListing>,
    ) -> SourceReport {
        let secs = run.elapsed.as_secs_f64();
        let elapsed_ms = run.elapsed.as_millis() as u64;

        let outcome = match run.result {
            Some(Ok(mut found)) => {
                self.tracker.record_success(name, secs, found.len());
                tracing::info!(source = %name, elapsed_ms, "Found {} listings", found.len());
                let items = found.len();
                found.truncate(limit);
                listings.extend(found);
                SourceOutcome::Succeeded { items }
            }
            Some(Err(e)) if e.is_block() => {
                self.tracker.record_block(name);
                tracing::warn!(source = %name, elapsed_ms, "{}", e);
                SourceOutcome::Blocked {
                    reason: e.to_string(),
                }
            }
            Some(Err(e)) => {
                self.tracker.record_failure(name, Some(secs));
                tracing::warn!(source = %name, elapsed_ms, "{}", e);
                SourceOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            None => {
                self.tracker.record_failure(name, Some(secs));
                tracing::warn!(source = %name, elapsed_ms, "Worker timed out");
                SourceOutcome::TimedOut
            }
        };

        SourceReport {
            source: name.to_string(),
            outcome,
            elapsed: run.elapsed,
        }
    }
}
