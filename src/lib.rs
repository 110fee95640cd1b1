//! Gear-Sweep: multi-source used equipment discovery
//!
//! This crate crawls independent marketplaces, auction and surplus sites for
//! equipment listings, tracks how each source treats the crawler, escalates an
//! evasion strategy when a source starts blocking, and serves normalized,
//! scored listings through a live crawl / stored data / synthetic data
//! fallback chain.

pub mod config;
pub mod crawler;
pub mod normalize;
pub mod output;
pub mod resolver;
pub mod storage;
pub mod synthetic;
pub mod tracker;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Gear-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised by a single source crawl worker
///
/// These never reach the caller of a search: the dispatcher converts them into
/// tracker updates and keeps going with the other sources.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{source_name} timed out after {after:?}")]
    Timeout { source_name: String, after: Duration },

    #[error("{source_name} blocked the crawler: {reason}")]
    Blocked { source_name: String, reason: String },

    #[error("{source_name} connection failed: {message}")]
    Connection {
        source_name: String,
        message: String,
    },

    #[error("{source_name} returned HTTP {status}")]
    HttpStatus { source_name: String, status: u16 },

    #[error("{source_name} page could not be extracted: {message}")]
    Extraction {
        source_name: String,
        message: String,
    },
}

impl WorkerError {
    /// True when the error is a bot-detection signal rather than an ordinary failure
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    /// Name of the source that produced the error
    pub fn source_name(&self) -> &str {
        match self {
            Self::Timeout { source_name, .. }
            | Self::Blocked { source_name, .. }
            | Self::Connection { source_name, .. }
            | Self::HttpStatus { source_name, .. }
            | Self::Extraction { source_name, .. } => source_name,
        }
    }
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Gear-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Dispatcher, RawListing, SourceWorker};
pub use normalize::{Condition, ListingStatus, NormalizedListing, Normalizer};
pub use resolver::{CrawlMode, CrawlRequest, FallbackResolver, ResolveResponse, ResultTier};
pub use tracker::{EvasionLevel, EvasionStrategy, SourceMetrics, SourceTracker};
