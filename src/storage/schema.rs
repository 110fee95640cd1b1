//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the listings database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Normalized listings, one row per canonical listing URL
CREATE TABLE IF NOT EXISTS listings (
    url TEXT PRIMARY KEY,
    id TEXT NOT NULL,
    title TEXT NOT NULL,
    brand TEXT NOT NULL,
    model TEXT NOT NULL,
    condition TEXT NOT NULL,
    condition_detail TEXT NOT NULL,
    price REAL,
    location TEXT NOT NULL,
    description TEXT NOT NULL,
    images TEXT NOT NULL DEFAULT '[]',
    source TEXT NOT NULL,
    discovered_at TEXT NOT NULL,
    score_overall INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'active'
);

CREATE INDEX IF NOT EXISTS idx_listings_brand ON listings(brand);
CREATE INDEX IF NOT EXISTS idx_listings_status ON listings(status);
CREATE INDEX IF NOT EXISTS idx_listings_score ON listings(score_overall);

-- Search history
CREATE TABLE IF NOT EXISTS searches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    query TEXT NOT NULL,
    mode TEXT NOT NULL,
    tier TEXT NOT NULL,
    result_count INTEGER NOT NULL,
    searched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_searches_at ON searches(searched_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
