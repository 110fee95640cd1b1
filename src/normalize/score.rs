//! Relevance / deal-quality score
//!
//! Every tier (live crawl, stored listings, synthetic listings) goes through
//! the same function, so a listing scores identically whichever path it
//! arrived by.

use crate::config::SourceKind;
use crate::normalize::brand::is_premium;
use crate::normalize::condition::{Condition, SalesChannel};

/// Base score for sources with no profile of their own
pub const DEFAULT_BASE_SCORE: i32 = 75;

const PREMIUM_BRAND_BONUS: i32 = 15;

/// How a source's listings are scored and defaulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceScoring {
    pub base_score: i32,
    pub channel: SalesChannel,
}

impl Default for SourceScoring {
    fn default() -> Self {
        Self {
            base_score: DEFAULT_BASE_SCORE,
            channel: SalesChannel::General,
        }
    }
}

impl SourceScoring {
    /// Scoring profile for one of the built-in source kinds
    pub fn for_kind(kind: SourceKind) -> Self {
        let (base_score, channel) = match kind {
            SourceKind::Ebay => (75, SalesChannel::General),
            SourceKind::Labx => (80, SalesChannel::General),
            SourceKind::Govdeals => (70, SalesChannel::Surplus),
            SourceKind::Bidspotter => (85, SalesChannel::Auction),
            SourceKind::Dotmed => (80, SalesChannel::Auction),
        };
        Self {
            base_score,
            channel,
        }
    }
}

/// Scores a listing, clamped to `0..=100`
///
/// Starts from the source's base score, then adds the premium brand bonus,
/// the price band adjustment and the condition bonus.
pub fn score_listing(base_score: i32, brand: &str, price: Option<f64>, condition: Condition) -> u8 {
    let mut score = base_score;

    if is_premium(brand) {
        score += PREMIUM_BRAND_BONUS;
    }

    if let Some(price) = price {
        score += price_adjustment(price);
    }

    score += match condition {
        Condition::New | Condition::UsedExcellent => 10,
        Condition::UsedGood => 5,
        _ => 0,
    };

    score.clamp(0, 100) as u8
}

fn price_adjustment(price: f64) -> i32 {
    if price < 5_000.0 {
        30
    } else if price < 15_000.0 {
        20
    } else if price < 30_000.0 {
        10
    } else if price <= 50_000.0 {
        0
    } else if price <= 80_000.0 {
        -5
    } else {
        -10
    }
}
