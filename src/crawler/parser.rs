//! Listing card extraction from search result pages
//!
//! This module pulls listing cards out of a results page:
//! - Card, title, link, price, condition, location and image selectors come
//!   from the site profile
//! - Relative links and images are resolved against the page URL
//! - Promotional cards (e.g. "Shop on eBay") are skipped by title

use crate::crawler::worker::RawListing;
use crate::url::resolve_href;
use crate::WorkerError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Upper bound on cards taken from one page
const MAX_CARDS_PER_PAGE: usize = 60;

/// CSS selectors describing one site's results markup
///
/// Each field may be a selector list (`"h3 a, .title a"`); the first
/// matching element inside the card is used.
#[derive(Debug, Clone, Copy)]
pub struct ListingSelectors {
    pub card: &'static str,
    pub title: &'static str,
    pub link: &'static str,
    pub price: &'static str,
    pub condition: &'static str,
    pub location: &'static str,
    pub image: &'static str,
    /// Card titles that mark placeholders or ads, matched case-insensitively
    pub skip_titles: &'static [&'static str],
}

struct CompiledSelectors {
    card: Selector,
    title: Selector,
    link: Selector,
    price: Selector,
    condition: Selector,
    location: Selector,
    image: Selector,
}

impl ListingSelectors {
    fn compile(&self, source_name: &str) -> Result<CompiledSelectors, WorkerError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| WorkerError::Extraction {
                source_name: source_name.to_string(),
                message: format!("invalid selector '{}': {:?}", css, e),
            })
        };

        Ok(CompiledSelectors {
            card: parse(self.card)?,
            title: parse(self.title)?,
            link: parse(self.link)?,
            price: parse(self.price)?,
            condition: parse(self.condition)?,
            location: parse(self.location)?,
            image: parse(self.image)?,
        })
    }
}

/// Extracts raw listings from a results page
///
/// # Arguments
///
/// * `html` - The results page body
/// * `page_url` - Final URL of the page, for resolving relative links
/// * `selectors` - The site's markup description
/// * `source_name` - Name stamped on every listing
///
/// # Returns
///
/// * `Ok(listings)` - Possibly empty when the page has no result cards
/// * `Err(WorkerError::Extraction)` - Cards were found but none could be
///   read, which means the markup no longer matches the profile
pub fn extract_listings(
    html: &str,
    page_url: &Url,
    selectors: &ListingSelectors,
    source_name: &str,
) -> Result<Vec<RawListing>, WorkerError> {
    let compiled = selectors.compile(source_name)?;
    let document = Html::parse_document(html);

    let mut listings = Vec::new();
    let mut cards_seen = 0;

    for card in document.select(&compiled.card).take(MAX_CARDS_PER_PAGE) {
        let title = first_text(&card, &compiled.title);
        if let Some(title) = &title {
            if selectors
                .skip_titles
                .iter()
                .any(|skip| title.eq_ignore_ascii_case(skip))
            {
                continue;
            }
        }

        // Placeholder cards never count as results
        cards_seen += 1;
        let Some(title) = title else {
            continue;
        };

        let Some(url) = first_link(&card, &compiled.link, page_url) else {
            continue;
        };

        let mut listing = RawListing::new(source_name, title, url);
        listing.price_text = first_text(&card, &compiled.price);
        listing.condition_text = first_text(&card, &compiled.condition);
        listing.location_text = first_text(&card, &compiled.location);
        listing.image_urls = card
            .select(&compiled.image)
            .filter_map(|img| {
                img.value()
                    .attr("src")
                    .or_else(|| img.value().attr("data-src"))
            })
            .filter(|src| !src.starts_with("data:"))
            .filter_map(|src| resolve_href(page_url, src).ok())
            .map(|u| u.to_string())
            .take(5)
            .collect();

        listings.push(listing);
    }

    if cards_seen > 0 && listings.is_empty() {
        return Err(WorkerError::Extraction {
            source_name: source_name.to_string(),
            message: format!("{} result cards found but none had a title and link", cards_seen),
        });
    }

    Ok(listings)
}

/// Trimmed, whitespace-collapsed text of the first non-empty match
fn first_text(card: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|text| !text.is_empty())
}

/// Absolute http(s) URL of the first usable link
fn first_link(card: &ElementRef<'_>, selector: &Selector, page_url: &Url) -> Option<String> {
    card.select(selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| {
            !href.is_empty()
                && !href.starts_with('#')
                && !href.starts_with("javascript:")
                && !href.starts_with("mailto:")
        })
        .filter_map(|href| resolve_href(page_url, href).ok())
        .find(|url| url.scheme() == "http" || url.scheme() == "https")
        .map(|url| url.to_string())
}
