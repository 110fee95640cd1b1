//! Flat JSON file holding every source's metrics
//!
//! The file is read once at startup and rewritten after every mutation. A
//! missing or unreadable file is not an error: the tracker re-seeds from the
//! default roster instead.

use crate::tracker::metrics::SourceMetrics;
use crate::tracker::strategy::EvasionLevel;
use crate::SweepError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Sources known before any crawl has run, with the evasion level each one
/// is known to need
pub const DEFAULT_ROSTER: &[(&str, EvasionLevel)] = &[
    ("eBay", EvasionLevel::High),
    ("BidSpotter", EvasionLevel::Medium),
    ("DOTmed Auctions", EvasionLevel::Low),
    ("GovDeals", EvasionLevel::Low),
    ("Proxibid", EvasionLevel::Medium),
    ("LabX", EvasionLevel::Low),
    ("Facebook Marketplace", EvasionLevel::High),
    ("Craigslist", EvasionLevel::High),
];

/// Builds the default roster
pub fn default_metrics() -> HashMap<String, SourceMetrics> {
    DEFAULT_ROSTER
        .iter()
        .map(|(name, level)| (name.to_string(), SourceMetrics::with_level(*name, *level)))
        .collect()
}

/// JSON-backed metrics file
#[derive(Debug, Clone)]
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the metrics file
    pub fn load(&self) -> Result<HashMap<String, SourceMetrics>, SweepError> {
        let content = std::fs::read_to_string(&self.path)?;
        let metrics: HashMap<String, SourceMetrics> = serde_json::from_str(&content)?;
        Ok(metrics)
    }

    /// Reads the metrics file, falling back to the default roster when it is
    /// missing or corrupt
    pub fn load_or_seed(&self) -> HashMap<String, SourceMetrics> {
        match self.load() {
            Ok(metrics) => {
                tracing::debug!(
                    "Loaded metrics for {} sources from {}",
                    metrics.len(),
                    self.path.display()
                );
                metrics
            }
            Err(SweepError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "No metrics file at {}, seeding default sources",
                    self.path.display()
                );
                default_metrics()
            }
            Err(e) => {
                tracing::warn!(
                    "Unreadable metrics file {} ({}), seeding default sources",
                    self.path.display(),
                    e
                );
                default_metrics()
            }
        }
    }

    /// Rewrites the metrics file (temp file + rename)
    pub fn save(&self, metrics: &HashMap<String, SourceMetrics>) -> Result<(), SweepError> {
        let json = serde_json::to_string_pretty(metrics)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
