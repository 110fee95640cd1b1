use crate::resolver::CrawlMode;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Gear-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(rename = "source", default = "default_sources")]
    pub sources: Vec<SourceEntry>,
}

impl Config {
    /// Sources that take part in live crawls
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceEntry> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Crawl dispatch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of source workers running at the same time
    #[serde(rename = "pool-size")]
    pub pool_size: u32,

    /// Timeout applied to each individual source worker (milliseconds)
    #[serde(rename = "worker-timeout-ms")]
    pub worker_timeout_ms: u64,

    /// Deadline for a whole dispatch across all sources (milliseconds)
    #[serde(rename = "global-deadline-ms")]
    pub global_deadline_ms: u64,

    /// Forward proxy used when an evasion strategy requires one
    #[serde(rename = "proxy-url", default)]
    pub proxy_url: Option<String>,
}

impl CrawlerConfig {
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn global_deadline(&self) -> Duration {
        Duration::from_millis(self.global_deadline_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite listings database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the JSON source metrics file
    #[serde(rename = "metrics-path")]
    pub metrics_path: String,
}

/// Defaults applied to searches that do not specify them
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(rename = "default-limit", default = "default_limit")]
    pub default_limit: usize,

    #[serde(rename = "default-mode", default)]
    pub default_mode: CrawlMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            default_mode: CrawlMode::default(),
        }
    }
}

/// One external source taking part in live crawls
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Display name, also the key in the source metrics store
    pub name: String,

    /// Which built-in site profile drives this source
    pub kind: SourceKind,

    /// Overrides the site's default base URL
    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Built-in site profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Ebay,
    Labx,
    Govdeals,
    Bidspotter,
    Dotmed,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Ebay,
        SourceKind::Labx,
        SourceKind::Govdeals,
        SourceKind::Bidspotter,
        SourceKind::Dotmed,
    ];

    /// Name the source is tracked under when none is configured
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Ebay => "eBay",
            Self::Labx => "LabX",
            Self::Govdeals => "GovDeals",
            Self::Bidspotter => "BidSpotter",
            Self::Dotmed => "DOTmed Auctions",
        }
    }
}

fn default_limit() -> usize {
    10
}

fn default_enabled() -> bool {
    true
}

fn default_sources() -> Vec<SourceEntry> {
    SourceKind::ALL
        .iter()
        .map(|kind| SourceEntry {
            name: kind.default_name().to_string(),
            kind: *kind,
            base_url: None,
            enabled: true,
        })
        .collect()
}
