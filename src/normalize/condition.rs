use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical listing condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    UsedExcellent,
    UsedGood,
    UsedFair,
    Refurbished,
    Unknown,
}

impl Condition {
    /// Stable identifier used in storage and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::UsedExcellent => "used_excellent",
            Self::UsedGood => "used_good",
            Self::UsedFair => "used_fair",
            Self::Refurbished => "refurbished",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::UsedExcellent => "Used - Excellent",
            Self::UsedGood => "Used - Good",
            Self::UsedFair => "Used - Fair",
            Self::Refurbished => "Refurbished",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "used_excellent" => Ok(Self::UsedExcellent),
            "used_good" => Ok(Self::UsedGood),
            "used_fair" => Ok(Self::UsedFair),
            "refurbished" => Ok(Self::Refurbished),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown condition '{}'", other)),
        }
    }
}

/// The kind of channel a source sells through
///
/// Decides what a listing's condition is assumed to be when the page does not
/// say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SalesChannel {
    General,
    Auction,
    Surplus,
}

impl SalesChannel {
    pub fn default_condition_text(&self) -> &'static str {
        match self {
            Self::General => "Used - Good",
            Self::Auction => "Used - Auction",
            Self::Surplus => "Used - Government Surplus",
        }
    }
}

/// Maps free-text condition to `(canonical, detail)`
///
/// `detail` is the trimmed input, or the channel default when the input is
/// absent or blank. Matching is keyword based and checked in a fixed order so
/// that "for parts, not working" is fair rather than good.
pub fn canonicalize_condition(text: Option<&str>, channel: SalesChannel) -> (Condition, String) {
    let detail = text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| channel.default_condition_text())
        .to_string();

    (classify(&detail), detail)
}

fn classify(text: &str) -> Condition {
    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["refurb"]) {
        Condition::Refurbished
    } else if has(&["like new", "open box", "excellent", "mint"]) {
        Condition::UsedExcellent
    } else if has(&["fair", "as is", "as-is", "parts", "poor", "not working"]) {
        Condition::UsedFair
    } else if has(&["new"]) {
        Condition::New
    } else if has(&["good", "working", "tested", "used", "pre-owned"]) {
        Condition::UsedGood
    } else {
        Condition::Unknown
    }
}
