//! Storage module for persisted listings
//!
//! This module handles all database operations for the sweep, including:
//! - SQLite database initialization and schema management
//! - Listing upserts keyed by canonical URL
//! - Token lookups that back the database result tier
//! - Search history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteListingStore;
pub use traits::{ListingStore, SearchRecord, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens the listings database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteListingStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteListingStore> {
    SqliteListingStore::new(path)
}
