//! Source performance tracking
//!
//! This module keeps per-source request outcomes and decides how hard each
//! source's crawler must work to avoid detection:
//!
//! - `strategy`: the static evasion level -> request profile table
//! - `metrics`: counters and evasion level for one source
//! - `store`: the JSON file the metrics survive restarts in
//!
//! The [`SourceTracker`] owns all of it. It is constructed once and shared by
//! reference (`Arc`) with the dispatcher; there is no global instance.

mod metrics;
mod store;
mod strategy;

pub use metrics::SourceMetrics;
pub use store::{default_metrics, MetricsStore, DEFAULT_ROSTER};
pub use strategy::{strategy_for_level, EvasionLevel, EvasionStrategy, HeaderSet};

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One row of the source ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRanking {
    pub source: String,
    pub success_rate: f64,
    pub items_found: u64,
    pub evasion_level: EvasionLevel,
    pub block_count: u64,
    pub average_response_time: f64,
}

/// Totals across every tracked source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub total_sources: usize,
    pub total_requests: u64,
    pub total_successful: u64,
    pub total_items_found: u64,
    pub total_blocks: u64,
    pub overall_success_rate: f64,
    pub sources_low: usize,
    pub sources_medium: usize,
    pub sources_high: usize,
}

/// Tracks per-source performance and evasion levels
///
/// All updates go through one lock that covers the read-modify-write of a
/// source's metrics and the following file rewrite. Persistence failures are
/// logged and swallowed; tracking must never abort a crawl.
pub struct SourceTracker {
    metrics: Mutex<HashMap<String, SourceMetrics>>,
    store: Option<MetricsStore>,
}

impl SourceTracker {
    /// Opens the tracker backed by a metrics file
    ///
    /// A missing or corrupt file re-seeds the default roster.
    pub fn open(path: &Path) -> Self {
        let store = MetricsStore::new(path);
        let metrics = store.load_or_seed();
        Self {
            metrics: Mutex::new(metrics),
            store: Some(store),
        }
    }

    /// Creates a tracker that keeps metrics in memory only
    pub fn in_memory() -> Self {
        Self::from_metrics(HashMap::new())
    }

    /// Creates an in-memory tracker preloaded with metrics
    pub fn from_metrics(metrics: HashMap<String, SourceMetrics>) -> Self {
        Self {
            metrics: Mutex::new(metrics),
            store: None,
        }
    }

    /// Returns the evasion strategy for a source, creating its metrics on first use
    pub fn strategy_for(&self, source: &str) -> EvasionStrategy {
        let mut metrics = self.lock();
        Self::entry(&mut metrics, source).strategy()
    }

    /// Records a successful crawl of `source`
    pub fn record_success(&self, source: &str, response_time: f64, items_found: usize) {
        self.mutate(source, |m| m.record_success(response_time, items_found, Utc::now()));
    }

    /// Records a failed crawl of `source`
    pub fn record_failure(&self, source: &str, response_time: Option<f64>) {
        self.mutate(source, |m| m.record_failure(response_time, Utc::now()));
    }

    /// Records that `source` detected and blocked the crawler
    pub fn record_block(&self, source: &str) {
        self.mutate(source, |m| {
            let before = m.evasion_level;
            m.record_block();
            if m.evasion_level != before {
                tracing::warn!(
                    source = %m.source_name,
                    "Block detected, evasion level raised from {} to {}",
                    before,
                    m.evasion_level
                );
            } else {
                tracing::warn!(source = %m.source_name, "Block detected at maximum evasion level");
            }
        });
    }

    /// Operational reset of a source's evasion level back to low
    ///
    /// Returns false when the source has never been tracked.
    pub fn reset_evasion(&self, source: &str) -> bool {
        let mut metrics = self.lock();
        let found = match metrics.get_mut(source) {
            Some(m) => {
                m.reset_evasion();
                true
            }
            None => false,
        };
        if found {
            self.persist(&metrics);
        }
        found
    }

    /// Copy of one source's metrics
    pub fn snapshot(&self, source: &str) -> Option<SourceMetrics> {
        self.lock().get(source).cloned()
    }

    /// Copy of every source's metrics
    pub fn all_metrics(&self) -> HashMap<String, SourceMetrics> {
        self.lock().clone()
    }

    /// Sources ranked by success rate, then items found
    ///
    /// Sources that have not been requested yet carry no signal and are left out.
    pub fn ranking(&self) -> Vec<SourceRanking> {
        let metrics = self.lock();
        let mut ranking: Vec<SourceRanking> = metrics
            .values()
            .filter(|m| m.total_requests > 0)
            .map(|m| SourceRanking {
                source: m.source_name.clone(),
                success_rate: m.success_rate(),
                items_found: m.items_found,
                evasion_level: m.evasion_level,
                block_count: m.block_count,
                average_response_time: m.average_response_time,
            })
            .collect();

        ranking.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then_with(|| b.items_found.cmp(&a.items_found))
                .then_with(|| a.source.cmp(&b.source))
        });
        ranking
    }

    /// Totals across all sources
    pub fn performance_summary(&self) -> PerformanceSummary {
        let metrics = self.lock();
        let total_requests: u64 = metrics.values().map(|m| m.total_requests).sum();
        let total_successful: u64 = metrics.values().map(|m| m.successful_requests).sum();
        let count_level =
            |level: EvasionLevel| metrics.values().filter(|m| m.evasion_level == level).count();

        PerformanceSummary {
            total_sources: metrics.len(),
            total_requests,
            total_successful,
            total_items_found: metrics.values().map(|m| m.items_found).sum(),
            total_blocks: metrics.values().map(|m| m.block_count).sum(),
            overall_success_rate: if total_requests > 0 {
                total_successful as f64 / total_requests as f64
            } else {
                0.0
            },
            sources_low: count_level(EvasionLevel::Low),
            sources_medium: count_level(EvasionLevel::Medium),
            sources_high: count_level(EvasionLevel::High),
        }
    }

    fn mutate(&self, source: &str, update: impl FnOnce(&mut SourceMetrics)) {
        let mut metrics = self.lock();
        update(Self::entry(&mut metrics, source));
        self.persist(&metrics);
    }

    fn entry<'a>(
        metrics: &'a mut HashMap<String, SourceMetrics>,
        source: &str,
    ) -> &'a mut SourceMetrics {
        metrics
            .entry(source.to_string())
            .or_insert_with(|| SourceMetrics::new(source))
    }

    fn persist(&self, metrics: &HashMap<String, SourceMetrics>) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(metrics) {
                tracing::warn!(
                    "Failed to persist source metrics to {}: {}",
                    store.path().display(),
                    e
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SourceMetrics>> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
