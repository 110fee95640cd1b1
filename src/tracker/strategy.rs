//! Evasion strategy table
//!
//! Maps an evasion level to the request profile a worker must use against a
//! source. The table is static; lookups are pure and need no locking.

use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How aggressively a source crawler must disguise itself
///
/// Serialized as the plain integer 1, 2 or 3.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum EvasionLevel {
    #[default]
    Low = 1,
    Medium = 2,
    High = 3,
}

impl EvasionLevel {
    /// The next level up, saturating at `High`
    pub fn escalate(self) -> Self {
        match self {
            Self::Low => Self::Medium,
            Self::Medium | Self::High => Self::High,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl TryFrom<u8> for EvasionLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            other => Err(format!("evasion level must be 1, 2 or 3, got {}", other)),
        }
    }
}

impl From<EvasionLevel> for u8 {
    fn from(level: EvasionLevel) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for EvasionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.label())
    }
}

/// One coherent browser identity: a user agent plus the headers sent with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSet {
    pub user_agent: &'static str,
    pub headers: &'static [(&'static str, &'static str)],
}

/// Request profile a worker applies for one crawl
#[derive(Debug, Clone, PartialEq)]
pub struct EvasionStrategy {
    pub level: EvasionLevel,

    /// Random think time window applied before the first request
    pub delay_range: (Duration, Duration),

    /// Identities to rotate between; one is picked per crawl
    pub candidate_headers: Vec<HeaderSet>,

    /// Whether requests must go through the configured forward proxy
    pub requires_proxy: bool,

    /// Whether every crawl must start from a fresh session (no cookie reuse)
    pub fresh_session: bool,
}

impl EvasionStrategy {
    /// Draws a think time from the delay window
    pub fn think_time(&self) -> Duration {
        let (min, max) = self.delay_range;
        if max <= min {
            return min;
        }
        let millis = rand::rng().random_range(min.as_millis() as u64..=max.as_millis() as u64);
        Duration::from_millis(millis)
    }

    /// Picks one identity at random
    pub fn pick_headers(&self) -> &HeaderSet {
        self.candidate_headers
            .choose(&mut rand::rng())
            .unwrap_or(&LOW_HEADER_SETS[0])
    }

    /// Same profile without think time, for callers that pace requests themselves
    pub fn without_delay(mut self) -> Self {
        self.delay_range = (Duration::ZERO, Duration::ZERO);
        self
    }
}

const LOW_HEADERS: &[(&str, &str)] = &[("Accept", "text/html,application/xhtml+xml")];

const MEDIUM_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("DNT", "1"),
    ("Upgrade-Insecure-Requests", "1"),
];

const HIGH_HEADERS: &[(&str, &str)] = &[
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("DNT", "1"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Cache-Control", "max-age=0"),
];

static LOW_HEADER_SETS: [HeaderSet; 1] = [HeaderSet {
    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36",
    headers: LOW_HEADERS,
}];

static MEDIUM_HEADER_SETS: [HeaderSet; 3] = [
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
        headers: MEDIUM_HEADERS,
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36",
        headers: MEDIUM_HEADERS,
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36",
        headers: MEDIUM_HEADERS,
    },
];

static HIGH_HEADER_SETS: [HeaderSet; 5] = [
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        headers: HIGH_HEADERS,
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        headers: HIGH_HEADERS,
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        headers: HIGH_HEADERS,
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
        headers: HIGH_HEADERS,
    },
    HeaderSet {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:125.0) Gecko/20100101 Firefox/125.0",
        headers: HIGH_HEADERS,
    },
];

/// Returns the request profile for an evasion level
pub fn strategy_for_level(level: EvasionLevel) -> EvasionStrategy {
    match level {
        EvasionLevel::Low => EvasionStrategy {
            level,
            delay_range: (Duration::from_secs(1), Duration::from_secs(3)),
            candidate_headers: LOW_HEADER_SETS.to_vec(),
            requires_proxy: false,
            fresh_session: false,
        },
        EvasionLevel::Medium => EvasionStrategy {
            level,
            delay_range: (Duration::from_secs(3), Duration::from_secs(8)),
            candidate_headers: MEDIUM_HEADER_SETS.to_vec(),
            requires_proxy: true,
            fresh_session: false,
        },
        EvasionLevel::High => EvasionStrategy {
            level,
            delay_range: (Duration::from_secs(8), Duration::from_secs(15)),
            candidate_headers: HIGH_HEADER_SETS.to_vec(),
            requires_proxy: true,
            fresh_session: true,
        },
    }
}
