//! Storage traits and error types
//!
//! This module defines the trait interface the resolver uses for persisted
//! listings, and the associated error types.

use crate::normalize::NormalizedListing;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One entry of the search history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    pub id: i64,
    pub query: String,
    pub mode: String,
    pub tier: String,
    pub result_count: usize,
    pub searched_at: DateTime<Utc>,
}

/// Trait for persisted listing backends
///
/// Implementations must be usable from several tasks at once; the crawl
/// core only ever calls these four operations and never manages schema or
/// connections itself.
pub trait ListingStore: Send + Sync {
    /// Active listings matching every token of `query`
    ///
    /// # Arguments
    ///
    /// * `query` - Free-text search; each whitespace token must match the
    ///   title, brand, model or description (case-insensitive)
    /// * `limit` - Maximum rows returned
    fn lookup_by_query(&self, query: &str, limit: usize) -> StorageResult<Vec<NormalizedListing>>;

    /// Inserts or refreshes listings keyed by URL
    ///
    /// On conflict the newer price, timestamp, score and status win; text
    /// fields are refreshed only with known values.
    ///
    /// # Returns
    ///
    /// Number of rows written
    fn upsert_many(&self, listings: &[NormalizedListing]) -> StorageResult<usize>;

    /// Appends to the search history
    fn record_search(
        &self,
        query: &str,
        mode: &str,
        tier: &str,
        result_count: usize,
    ) -> StorageResult<()>;

    /// Most recent searches first
    fn recent_searches(&self, limit: usize) -> StorageResult<Vec<SearchRecord>>;
}
