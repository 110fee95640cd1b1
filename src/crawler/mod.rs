//! Crawler module for source workers and dispatch
//!
//! This module contains the live crawl tier, including:
//! - The source worker contract and raw listing shape
//! - HTTP fetching with per-strategy identities and block detection
//! - Listing card extraction from results pages
//! - The reference site profiles
//! - Concurrent dispatch with bounded pool and deadlines

mod dispatcher;
mod fetcher;
mod parser;
mod sites;
mod worker;

pub use dispatcher::{DispatchReport, DispatchSettings, Dispatcher, SourceOutcome, SourceReport};
pub use fetcher::{build_client, detect_block, fetch_page, identity_headers, FetchedPage};
pub use parser::{extract_listings, ListingSelectors};
pub use sites::{
    build_workers, profile_for, MarketplaceWorker, SiteProfile, BIDSPOTTER, DOTMED, EBAY,
    GOVDEALS, LABX,
};
pub use worker::{RawListing, SourceWorker};
