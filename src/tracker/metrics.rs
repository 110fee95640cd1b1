use crate::tracker::strategy::{strategy_for_level, EvasionLevel, EvasionStrategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracks how one source has been treating the crawler
///
/// Every request resolves to exactly one outcome, so
/// `successful_requests + failed_requests == total_requests` always holds.
/// Blocks are counted separately and only ever raise the evasion level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceMetrics {
    pub source_name: String,

    #[serde(default)]
    pub total_requests: u64,

    #[serde(default)]
    pub successful_requests: u64,

    #[serde(default)]
    pub failed_requests: u64,

    #[serde(default)]
    pub block_count: u64,

    /// Listings returned by this source over its lifetime
    #[serde(default)]
    pub items_found: u64,

    /// Smoothed response time in seconds
    #[serde(default)]
    pub average_response_time: f64,

    #[serde(default)]
    pub evasion_level: EvasionLevel,

    #[serde(default)]
    pub last_success: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_failure: Option<DateTime<Utc>>,
}

impl SourceMetrics {
    /// Creates empty metrics at the lowest evasion level
    pub fn new(source_name: impl Into<String>) -> Self {
        Self::with_level(source_name, EvasionLevel::Low)
    }

    /// Creates empty metrics starting at a given evasion level
    pub fn with_level(source_name: impl Into<String>, evasion_level: EvasionLevel) -> Self {
        Self {
            source_name: source_name.into(),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            block_count: 0,
            items_found: 0,
            average_response_time: 0.0,
            evasion_level,
            last_success: None,
            last_failure: None,
        }
    }

    /// Fraction of requests that succeeded, 0 when nothing was requested yet
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    /// Records a successful request
    ///
    /// The response time is folded in as `(avg + t) / 2`, seeded with the
    /// first observation.
    pub fn record_success(&mut self, response_time: f64, items_found: usize, now: DateTime<Utc>) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.items_found += items_found as u64;
        self.last_success = Some(now);
        self.fold_response_time(response_time);
    }

    /// Records a failed request
    pub fn record_failure(&mut self, response_time: Option<f64>, now: DateTime<Utc>) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_failure = Some(now);
        if let Some(t) = response_time {
            self.fold_response_time(t);
        }
    }

    /// Records a detected block and raises the evasion level one step
    pub fn record_block(&mut self) {
        self.block_count += 1;
        self.evasion_level = self.evasion_level.escalate();
    }

    /// Drops the evasion level back to low; counters are kept
    pub fn reset_evasion(&mut self) {
        self.evasion_level = EvasionLevel::Low;
    }

    /// The request profile for the current evasion level
    pub fn strategy(&self) -> EvasionStrategy {
        strategy_for_level(self.evasion_level)
    }

    fn fold_response_time(&mut self, t: f64) {
        if !t.is_finite() || t < 0.0 {
            return;
        }
        if self.average_response_time == 0.0 {
            self.average_response_time = t;
        } else {
            self.average_response_time = (self.average_response_time + t) / 2.0;
        }
    }
}
