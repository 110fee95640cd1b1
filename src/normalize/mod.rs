//! Listing normalization and scoring
//!
//! Turns the untrusted [`RawListing`]s workers return into canonical
//! [`NormalizedListing`]s:
//!
//! - `brand`: brand vocabulary and model extraction
//! - `price`: currency string parsing
//! - `condition`: free-text condition to the fixed enum
//! - `score`: relevance / deal score
//!
//! The [`Normalizer`] also de-duplicates by canonical URL and produces the
//! final ordering every result tier is returned in.

mod brand;
mod condition;
mod price;
mod score;

pub use brand::{extract_brand_model, find_brand, is_premium, BRANDS, PREMIUM_BRANDS, UNKNOWN};
pub use condition::{canonicalize_condition, Condition, SalesChannel};
pub use price::parse_price;
pub use score::{score_listing, SourceScoring, DEFAULT_BASE_SCORE};

use crate::config::{Config, SourceKind};
use crate::crawler::RawListing;
use crate::url::{canonical_listing_url, listing_id};
use crate::UrlError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a stored listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Inactive,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown listing status '{}'", other)),
        }
    }
}

/// The canonical listing record
///
/// `url` is the canonical listing URL and the de-duplication key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedListing {
    pub id: String,
    pub title: String,
    pub brand: String,
    pub model: String,
    pub condition: Condition,
    /// Condition as the source phrased it, or the channel default
    pub condition_detail: String,
    pub price: Option<f64>,
    pub location: String,
    pub description: String,
    pub url: String,
    pub images: Vec<String>,
    pub source: String,
    pub discovered_at: DateTime<Utc>,
    pub score_overall: u8,
    pub status: ListingStatus,
}

/// Converts, de-duplicates and ranks listings
#[derive(Debug, Clone)]
pub struct Normalizer {
    sources: HashMap<String, SourceScoring>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Normalizer knowing the built-in sources under their default names
    pub fn new() -> Self {
        let sources = SourceKind::ALL
            .iter()
            .map(|kind| (kind.default_name().to_string(), SourceScoring::for_kind(*kind)))
            .collect();
        Self { sources }
    }

    /// Normalizer that also knows every configured source name
    pub fn from_config(config: &Config) -> Self {
        let mut normalizer = Self::new();
        for entry in &config.sources {
            normalizer.register_source(&entry.name, SourceScoring::for_kind(entry.kind));
        }
        normalizer
    }

    pub fn register_source(&mut self, name: &str, scoring: SourceScoring) {
        self.sources.insert(name.to_string(), scoring);
    }

    /// Scoring profile for a source; unknown sources get the default
    pub fn scoring_for(&self, source: &str) -> SourceScoring {
        self.sources.get(source).copied().unwrap_or_default()
    }

    /// Converts one raw listing
    ///
    /// Fails only when the listing URL cannot be canonicalized.
    pub fn normalize(
        &self,
        raw: &RawListing,
        discovered_at: DateTime<Utc>,
    ) -> Result<NormalizedListing, UrlError> {
        let url = canonical_listing_url(&raw.url)?.to_string();
        let scoring = self.scoring_for(&raw.source_name);

        let title = collapse_whitespace(&raw.title);
        let (brand, model) = extract_brand_model(&title);
        let price = raw.price_text.as_deref().and_then(parse_price);
        let (condition, condition_detail) =
            canonicalize_condition(raw.condition_text.as_deref(), scoring.channel);
        let location = raw
            .location_text
            .as_deref()
            .map(collapse_whitespace)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let mut images: Vec<String> = Vec::new();
        for image in &raw.image_urls {
            let image = image.trim();
            if !image.is_empty() && !images.iter().any(|i| i == image) {
                images.push(image.to_string());
            }
        }

        let score_overall = score_listing(scoring.base_score, &brand, price, condition);

        Ok(NormalizedListing {
            id: listing_id(&raw.source_name, &url),
            description: format!("{} listing: {}", raw.source_name, title),
            title,
            brand,
            model,
            condition,
            condition_detail,
            price,
            location,
            url,
            images,
            source: raw.source_name.clone(),
            discovered_at,
            score_overall,
            status: ListingStatus::Active,
        })
    }

    /// Converts a batch of raw listings, dropping the ones with unusable URLs,
    /// and merges duplicates
    pub fn normalize_all(
        &self,
        raws: &[RawListing],
        discovered_at: DateTime<Utc>,
    ) -> Vec<NormalizedListing> {
        let listings = raws
            .iter()
            .filter_map(|raw| match self.normalize(raw, discovered_at) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    tracing::debug!(
                        source = %raw.source_name,
                        "Dropping listing '{}' with unusable URL: {}",
                        raw.title,
                        e
                    );
                    None
                }
            })
            .collect();

        self.dedup(listings)
    }

    /// Merges listings sharing a URL
    ///
    /// Merge rule, applied in arrival order:
    /// - the later listing's timestamp and status always win
    /// - the later listing's price wins when it has one; an absent price never
    ///   erases a known one
    /// - other text fields take the later value only when it is known
    ///   (not empty, not "Unknown")
    /// - images are unioned, earlier ones first
    ///
    /// The merged listing keeps the position of the first occurrence and is
    /// re-scored.
    pub fn dedup(&self, listings: Vec<NormalizedListing>) -> Vec<NormalizedListing> {
        let mut merged: Vec<NormalizedListing> = Vec::with_capacity(listings.len());
        let mut positions: HashMap<String, usize> = HashMap::new();

        for listing in listings {
            match positions.get(&listing.url) {
                Some(&index) => {
                    let existing = &mut merged[index];
                    merge_listing(existing, listing);
                    existing.score_overall = self.rescore(existing);
                }
                None => {
                    positions.insert(listing.url.clone(), merged.len());
                    merged.push(listing);
                }
            }
        }

        merged
    }

    /// De-duplicates, applies the price ceiling, orders and truncates
    ///
    /// Listings without a price are kept under a ceiling. The result is
    /// sorted by score descending, then price ascending (unpriced last), then
    /// URL, so identical inputs always give identical output.
    pub fn finalize(
        &self,
        listings: Vec<NormalizedListing>,
        max_price: Option<f64>,
        limit: usize,
    ) -> Vec<NormalizedListing> {
        let mut listings: Vec<NormalizedListing> = self
            .dedup(listings)
            .into_iter()
            .filter(|l| within_ceiling(l.price, max_price))
            .collect();

        listings.sort_by(compare_listings);
        listings.truncate(limit);
        listings
    }

    fn rescore(&self, listing: &NormalizedListing) -> u8 {
        let scoring = self.scoring_for(&listing.source);
        score_listing(
            scoring.base_score,
            &listing.brand,
            listing.price,
            listing.condition,
        )
    }
}

/// Final result ordering
pub fn compare_listings(a: &NormalizedListing, b: &NormalizedListing) -> Ordering {
    b.score_overall
        .cmp(&a.score_overall)
        .then_with(|| match (a.price, b.price) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.url.cmp(&b.url))
}

fn within_ceiling(price: Option<f64>, max_price: Option<f64>) -> bool {
    match (price, max_price) {
        (Some(price), Some(max)) => price <= max,
        _ => true,
    }
}

fn merge_listing(existing: &mut NormalizedListing, later: NormalizedListing) {
    existing.discovered_at = later.discovered_at;
    existing.status = later.status;
    if later.price.is_some() {
        existing.price = later.price;
    }

    let known = |value: &str| !value.is_empty() && value != UNKNOWN;
    if known(&later.title) {
        existing.title = later.title;
    }
    if known(&later.brand) {
        existing.brand = later.brand;
    }
    if known(&later.model) {
        existing.model = later.model;
    }
    if known(&later.location) {
        existing.location = later.location;
    }
    if known(&later.description) {
        existing.description = later.description;
    }
    if later.condition != Condition::Unknown {
        existing.condition = later.condition;
        existing.condition_detail = later.condition_detail;
    }

    for image in later.images {
        if !existing.images.contains(&image) {
            existing.images.push(image);
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
