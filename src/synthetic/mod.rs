//! Synthetic listing generator
//!
//! Produces plausible-looking listings for demos and for the last fallback
//! tier. Listings are query-aware: when the query names a brand, every
//! generated listing carries that brand. They are tagged with the
//! [`SYNTHETIC_SOURCE`] source name and point at a reserved `.invalid` host,
//! so they can never be mistaken for crawled data.

use crate::crawler::RawListing;
use crate::normalize::{find_brand, NormalizedListing, Normalizer};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

/// Source name stamped on every synthetic listing
pub const SYNTHETIC_SOURCE: &str = "synthetic";

const BASE_URL: &str = "https://synthetic.invalid";

/// Hard cap on listings per call, whatever the requested limit
pub const MAX_SYNTHETIC_LISTINGS: usize = 24;

struct CatalogEntry {
    brand: &'static str,
    models: &'static [&'static str],
    price_range: (u32, u32),
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        brand: "Aerolase",
        models: &["LightPod Neo Elite", "LightPod Era Elite", "LightPod Neo", "LightPod Pro"],
        price_range: (20_000, 40_000),
    },
    CatalogEntry {
        brand: "Agnes",
        models: &["Agnes RF", "Agnes Elite", "Agnes Pro"],
        price_range: (25_000, 45_000),
    },
    CatalogEntry {
        brand: "Allergan",
        models: &["DiamondGlow", "CoolSculpting Elite", "CoolSculpting Flex"],
        price_range: (30_000, 60_000),
    },
    CatalogEntry {
        brand: "Alma",
        models: &["Harmony XL", "Soprano", "Accent"],
        price_range: (25_000, 50_000),
    },
    CatalogEntry {
        brand: "Apyx",
        models: &["Renuvion", "Renuvion J-Plasma"],
        price_range: (35_000, 65_000),
    },
    CatalogEntry {
        brand: "BTL",
        models: &["Emsculpt", "Emsculpt NEO", "Emsella", "Exilis"],
        price_range: (40_000, 80_000),
    },
    CatalogEntry {
        brand: "Candela",
        models: &["GentleMax Pro", "Nordlys", "Vbeam Perfecta", "CoolGlide"],
        price_range: (35_000, 65_000),
    },
    CatalogEntry {
        brand: "Cutera",
        models: &["Excel V+", "Xeo SA", "Laser Genesis", "Titan"],
        price_range: (30_000, 60_000),
    },
    CatalogEntry {
        brand: "Cynosure",
        models: &["Elite+", "Icon", "PicoSure", "Monolith"],
        price_range: (40_000, 70_000),
    },
    CatalogEntry {
        brand: "Lumenis",
        models: &["LightSheer Duet", "M22", "Splendor X", "UltraPulse"],
        price_range: (45_000, 80_000),
    },
    CatalogEntry {
        brand: "Sciton",
        models: &["Joule", "Joule X", "Profile", "BBL"],
        price_range: (50_000, 90_000),
    },
    CatalogEntry {
        brand: "Syneron",
        models: &["VelaShape III", "eTwo", "eMatrix"],
        price_range: (30_000, 60_000),
    },
    CatalogEntry {
        brand: "Solta",
        models: &["Clear+Brilliant", "Fraxel Dual", "Thermage FLX"],
        price_range: (35_000, 70_000),
    },
    CatalogEntry {
        brand: "InMode",
        models: &["BodyTite", "Lumecca", "Optimas", "Morpheus8"],
        price_range: (40_000, 75_000),
    },
    CatalogEntry {
        brand: "Lutronic",
        models: &["eCO2", "LaseMD Ultra", "Spectra", "Genius RF"],
        price_range: (30_000, 60_000),
    },
    CatalogEntry {
        brand: "Fotona",
        models: &["QX MAX", "SP Dynamis", "StarWalker", "TimeWalker"],
        price_range: (45_000, 85_000),
    },
];

/// Brands picked from when the query names none
const FALLBACK_BRANDS: &[&str] = &[
    "Aerolase", "Candela", "Cynosure", "Lumenis", "Syneron", "Alma", "Cutera", "Sciton",
];

const GENERIC_MODEL: &str = "Professional";
const GENERIC_PRICE_RANGE: (u32, u32) = (30_000, 60_000);

const CONDITIONS: &[&str] = &["New", "Used - Excellent", "Used - Good", "Used - Fair", "Refurbished"];

const LOCATIONS: &[&str] = &[
    "California, USA",
    "Texas, USA",
    "New York, USA",
    "Florida, USA",
    "Illinois, USA",
    "Nevada, USA",
    "Pennsylvania, USA",
];

/// Generator for synthetic listings
#[derive(Debug, Clone, Default)]
pub struct SyntheticGenerator {
    seed: Option<u64>,
}

impl SyntheticGenerator {
    pub fn new() -> Self {
        Self { seed: None }
    }

    /// Generator that produces the same listings for the same query every call
    pub fn with_seed(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    /// Generates up to `limit` listings for `query`
    ///
    /// Listings go through `normalizer` like crawled ones, so they are scored
    /// and ordered the same way.
    pub fn generate(
        &self,
        query: &str,
        limit: usize,
        normalizer: &Normalizer,
    ) -> Vec<NormalizedListing> {
        let raws = match self.seed {
            Some(seed) => generate_raw(query, limit, &mut StdRng::seed_from_u64(seed)),
            None => generate_raw(query, limit, &mut rand::rng()),
        };

        let now = Utc::now();
        let mut listings = Vec::with_capacity(raws.len());
        for (raw, model) in raws {
            match normalizer.normalize(&raw, now) {
                Ok(mut listing) => {
                    listing.model = model;
                    listing.description = format!(
                        "Synthetic {} listing in {} condition.",
                        raw.title,
                        listing.condition_detail.to_lowercase()
                    );
                    listings.push(listing);
                }
                Err(e) => tracing::debug!("Skipping synthetic listing {}: {}", raw.url, e),
            }
        }
        listings
    }
}

/// Raw listings with the catalog model each was built from
fn generate_raw<R: Rng + ?Sized>(
    query: &str,
    limit: usize,
    rng: &mut R,
) -> Vec<(RawListing, String)> {
    let count = limit.min(MAX_SYNTHETIC_LISTINGS);
    let entry: Option<(&str, &CatalogEntry)> = find_brand(query).map(|(brand, _)| {
        let catalog = CATALOG
            .iter()
            .find(|entry| entry.brand.eq_ignore_ascii_case(brand))
            .unwrap_or(&GENERIC_ENTRY);
        (brand, catalog)
    });

    (0..count)
        .map(|index| {
            let (brand, catalog) = match entry {
                Some((brand, catalog)) => (brand, catalog),
                None => {
                    let brand = FALLBACK_BRANDS.choose(rng).copied().unwrap_or("Candela");
                    (brand, &GENERIC_ENTRY)
                }
            };
            let model = catalog.models.choose(rng).copied().unwrap_or(GENERIC_MODEL);
            let condition = CONDITIONS.choose(rng).copied().unwrap_or("Used - Good");
            let location = LOCATIONS.choose(rng).copied().unwrap_or("USA");
            let price = synthetic_price(catalog.price_range, condition, rng);

            let slug = format!("{}-{}", brand, model)
                .to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
                .collect::<String>();
            let item = rng.random_range(1000..10_000);

            let raw = RawListing::new(
                SYNTHETIC_SOURCE,
                format!("{} {} Laser System", brand, model),
                format!("{}/listing/{}-{}-{}", BASE_URL, slug, index + 1, item),
            )
            .with_price(format!("${}", price))
            .with_condition(condition)
            .with_location(location)
            .with_image(format!("{}/img/{}-{}.jpg", BASE_URL, slug, index + 1));

            (raw, model.to_string())
        })
        .collect()
}

const GENERIC_ENTRY: CatalogEntry = CatalogEntry {
    brand: "",
    models: &[GENERIC_MODEL],
    price_range: GENERIC_PRICE_RANGE,
};

/// List price discounted by condition
fn synthetic_price<R: Rng + ?Sized>(range: (u32, u32), condition: &str, rng: &mut R) -> u32 {
    let base = rng.random_range(range.0..=range.1) as f64;
    let factor = match condition {
        "New" => 1.0,
        "Used - Excellent" => rng.random_range(0.70..0.85),
        "Used - Good" => rng.random_range(0.55..0.70),
        "Used - Fair" => rng.random_range(0.40..0.55),
        _ => rng.random_range(0.65..0.80),
    };
    (base * factor) as u32
}
