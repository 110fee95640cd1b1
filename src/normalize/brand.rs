//! Brand and model extraction from listing titles

use regex::Regex;
use std::sync::LazyLock;

/// Known equipment manufacturers, in display form
pub const BRANDS: &[&str] = &[
    "Aerolase",
    "Agnes",
    "Allergan",
    "Alma",
    "Apyx",
    "BTL",
    "BlueCore",
    "Buffalo",
    "Candela",
    "Canfield",
    "Cocoon",
    "Cutera",
    "Cynosure",
    "Cytrellis",
    "DEKA",
    "DUSA",
    "Ellman",
    "Energist",
    "Envy",
    "Fotona",
    "Ilooda",
    "InMode",
    "Iridex",
    "Jeisys",
    "Laseroptek",
    "Lumenis",
    "Lutronic",
    "Luvo",
    "Merz",
    "MicroAire",
    "Mixto",
    "MRP",
    "Novoxel",
    "Ohmeda",
    "Palomar",
    "Perigee",
    "Pronox",
    "Quanta",
    "Quantel",
    "Rohrer",
    "Sandstone",
    "Sciton",
    "Sinclair",
    "Solta",
    "Syneron",
    "Thermi",
    "Venus",
    "Wontech",
    "Zimmer",
];

/// Brands that earn the premium score bonus
pub const PREMIUM_BRANDS: &[&str] = &[
    "Aerolase", "Candela", "Cynosure", "Lumenis", "Sciton", "Cutera", "Syneron",
];

pub const UNKNOWN: &str = "Unknown";

const MAX_MODEL_LEN: usize = 50;
const MAX_MODEL_TOKENS: usize = 3;

/// Words that end a model name rather than belong to it
const MODEL_STOP_WORDS: &[&str] = &[
    "laser", "lasers", "system", "systems", "device", "machine", "for", "with", "and", "-", "|",
];

static MODEL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9\-\.\+/]*$").expect("valid model token regex")
});

/// Finds the first brand named in `text`, case-insensitively
///
/// When several brands occur, the one appearing earliest wins; at the same
/// position the longer name wins (`Quantel` over `Quanta`). Returns the
/// brand's display form and the byte range it occupies in `text`.
pub fn find_brand(text: &str) -> Option<(&'static str, std::ops::Range<usize>)> {
    // ASCII lowercasing keeps byte offsets aligned with the original text
    let lower = text.to_ascii_lowercase();

    BRANDS
        .iter()
        .filter_map(|brand| {
            lower
                .find(&brand.to_ascii_lowercase())
                .map(|start| (*brand, start..start + brand.len()))
        })
        .min_by(|(a, ra), (b, rb)| ra.start.cmp(&rb.start).then(b.len().cmp(&a.len())))
}

/// Extracts `(brand, model)` from a listing title
///
/// Unrecognized titles yield `("Unknown", "Unknown")`. The model is the run of
/// up to three tokens right after the brand, stopping at descriptive words
/// like "laser" or "system", capped at 50 characters.
pub fn extract_brand_model(title: &str) -> (String, String) {
    let Some((brand, range)) = find_brand(title) else {
        return (UNKNOWN.to_string(), UNKNOWN.to_string());
    };

    let model = extract_model(&title[range.end..]).unwrap_or_else(|| UNKNOWN.to_string());
    (brand.to_string(), model)
}

/// Whether `brand` belongs to the premium tier
pub fn is_premium(brand: &str) -> bool {
    PREMIUM_BRANDS.iter().any(|p| p.eq_ignore_ascii_case(brand))
}

fn extract_model(rest: &str) -> Option<String> {
    // A brand matched inside a longer word has no model after it
    if rest.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return None;
    }

    let mut tokens: Vec<&str> = Vec::new();
    for raw in rest.trim_start_matches([':', ' ', '-', '\t']).split_whitespace() {
        let token = raw.trim_end_matches([',', ';', ':', '.', ')', '(']);
        if tokens.len() == MAX_MODEL_TOKENS
            || MODEL_STOP_WORDS.contains(&token.to_ascii_lowercase().as_str())
            || !MODEL_TOKEN.is_match(token)
        {
            break;
        }
        tokens.push(token);
        if token.len() != raw.len() {
            // Trailing punctuation closes the model name
            break;
        }
    }

    if tokens.is_empty() {
        return None;
    }

    let mut model = tokens.join(" ");
    if model.len() > MAX_MODEL_LEN {
        model.truncate(MAX_MODEL_LEN);
        model = model.trim_end().to_string();
    }
    Some(model)
}
