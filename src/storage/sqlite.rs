//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ListingStore trait.

use crate::normalize::{Condition, ListingStatus, NormalizedListing};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ListingStore, SearchRecord, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

const LISTING_COLUMNS: &str = "url, id, title, brand, model, condition, condition_detail, price, \
     location, description, images, source, discovered_at, score_overall, status";

/// SQLite listings backend
pub struct SqliteListingStore {
    conn: Mutex<Connection>,
}

impl SqliteListingStore {
    /// Opens (or creates) the listings database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; parent directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteListingStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored listings, active or not
    pub fn count_listings(&self) -> StorageResult<u64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Marks a listing inactive so lookups stop returning it
    pub fn set_status(&self, url: &str, status: ListingStatus) -> StorageResult<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE listings SET status = ?1 WHERE url = ?2",
            params![status.as_str(), url],
        )?;
        Ok(changed > 0)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ListingStore for SqliteListingStore {
    fn lookup_by_query(&self, query: &str, limit: usize) -> StorageResult<Vec<NormalizedListing>> {
        let tokens: Vec<String> = query
            .split_whitespace()
            .map(|t| format!("%{}%", escape_like(&t.to_lowercase())))
            .collect();
        if tokens.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {} FROM listings WHERE status = 'active'",
            LISTING_COLUMNS
        );
        for i in 1..=tokens.len() {
            sql.push_str(&format!(
                " AND (LOWER(title) LIKE ?{i} ESCAPE '\\' OR LOWER(brand) LIKE ?{i} ESCAPE '\\' \
                 OR LOWER(model) LIKE ?{i} ESCAPE '\\' OR LOWER(description) LIKE ?{i} ESCAPE '\\')"
            ));
        }
        // Rows whose brand or model carries the first token come first
        sql.push_str(&format!(
            " ORDER BY CASE WHEN LOWER(brand) LIKE ?1 ESCAPE '\\' OR LOWER(model) LIKE ?1 ESCAPE '\\' \
             THEN 0 ELSE 1 END, score_overall DESC, price IS NULL, price ASC, url ASC LIMIT {}",
            limit
        ));

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(tokens.iter()), row_to_listing)?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?);
        }
        Ok(listings)
    }

    fn upsert_many(&self, listings: &[NormalizedListing]) -> StorageResult<usize> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut written = 0;

        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO listings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(url) DO UPDATE SET
                    price = COALESCE(excluded.price, listings.price),
                    discovered_at = excluded.discovered_at,
                    score_overall = excluded.score_overall,
                    status = excluded.status,
                    title = CASE WHEN excluded.title <> '' THEN excluded.title ELSE listings.title END,
                    brand = CASE WHEN excluded.brand <> 'Unknown' THEN excluded.brand ELSE listings.brand END,
                    model = CASE WHEN excluded.model <> 'Unknown' THEN excluded.model ELSE listings.model END,
                    condition = CASE WHEN excluded.condition <> 'unknown' THEN excluded.condition ELSE listings.condition END,
                    condition_detail = CASE WHEN excluded.condition <> 'unknown' THEN excluded.condition_detail ELSE listings.condition_detail END,
                    location = CASE WHEN excluded.location <> 'Unknown' THEN excluded.location ELSE listings.location END,
                    description = CASE WHEN excluded.description <> '' THEN excluded.description ELSE listings.description END,
                    images = CASE WHEN excluded.images <> '[]' THEN excluded.images ELSE listings.images END",
                LISTING_COLUMNS
            ))?;

            for listing in listings {
                let images = serde_json::to_string(&listing.images)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;

                written += stmt.execute(params![
                    listing.url,
                    listing.id,
                    listing.title,
                    listing.brand,
                    listing.model,
                    listing.condition.as_str(),
                    listing.condition_detail,
                    listing.price,
                    listing.location,
                    listing.description,
                    images,
                    listing.source,
                    listing.discovered_at.to_rfc3339(),
                    listing.score_overall,
                    listing.status.as_str(),
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Upserted {} listings", written);
        Ok(written)
    }

    fn record_search(
        &self,
        query: &str,
        mode: &str,
        tier: &str,
        result_count: usize,
    ) -> StorageResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO searches (query, mode, tier, result_count, searched_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![query, mode, tier, result_count as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn recent_searches(&self, limit: usize) -> StorageResult<Vec<SearchRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, query, mode, tier, result_count, searched_at FROM searches
             ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SearchRecord {
                id: row.get(0)?,
                query: row.get(1)?,
                mode: row.get(2)?,
                tier: row.get(3)?,
                result_count: row.get::<_, i64>(4)?.max(0) as usize,
                searched_at: parse_timestamp(row, 5)?,
            })
        })?;

        let mut searches = Vec::new();
        for row in rows {
            searches.push(row?);
        }
        Ok(searches)
    }
}

fn row_to_listing(row: &Row<'_>) -> rusqlite::Result<NormalizedListing> {
    let images: String = row.get(10)?;
    let images: Vec<String> = serde_json::from_str(&images)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

    let condition: String = row.get(5)?;
    let condition: Condition = condition
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;

    let status: String = row.get(14)?;
    let status: ListingStatus = status
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(14, Type::Text, e.into()))?;

    Ok(NormalizedListing {
        url: row.get(0)?,
        id: row.get(1)?,
        title: row.get(2)?,
        brand: row.get(3)?,
        model: row.get(4)?,
        condition,
        condition_detail: row.get(6)?,
        price: row.get(7)?,
        location: row.get(8)?,
        description: row.get(9)?,
        images,
        source: row.get(11)?,
        discovered_at: parse_timestamp(row, 12)?,
        score_overall: row.get::<_, i64>(13)?.clamp(0, 100) as u8,
        status,
    })
}

fn parse_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
