use regex::Regex;
use std::sync::LazyLock;

static PRICE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9][0-9.,]*").expect("valid price regex"));

/// Parses a currency-formatted price string
///
/// The first run of digits, dots and commas is taken (so ranges like
/// "$1,200 - $1,500" yield the lower bound); commas are thousands separators.
/// Text with no digits, or a run that is not a number, yields `None`:
/// an absent price, never zero.
pub fn parse_price(text: &str) -> Option<f64> {
    let run = PRICE_RUN.find(text)?.as_str();
    let cleaned: String = run.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim_end_matches('.');

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
}
