//! Listing URL handling
//!
//! The canonical listing URL is the de-duplication key for listings, both
//! within one crawl and in the listings table.

mod canonical;

pub use canonical::{canonical_listing_url, listing_id, resolve_href, source_slug};
