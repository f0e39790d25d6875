//! Taxonomic normalization of raw detections.
//!
//! Maps detections into a fixed set of display categories, deduplicates
//! technology names, aggregates per-category confidence, and orders output
//! deterministically. Category resolution checks a canonical override table
//! (technology name -> slug) first; technologies not listed there fall back
//! to a slugified version of the fingerprint database's own category name.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

use crate::fingerprint::Detection;

/// Canonical technology name -> normalized category slug.
///
/// Overrides the fingerprint database's category for technologies whose
/// upstream categorization is too coarse or inconsistent for display.
static CATEGORY_OVERRIDES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("WordPress", "cms"),
        ("Drupal", "cms"),
        ("Joomla", "cms"),
        ("Ghost", "cms"),
        ("Shopify", "ecommerce"),
        ("WooCommerce", "ecommerce"),
        ("Magento", "ecommerce"),
        ("React", "javascript_frameworks"),
        ("Vue.js", "javascript_frameworks"),
        ("Angular", "javascript_frameworks"),
        ("Next.js", "javascript_frameworks"),
        ("Nuxt.js", "javascript_frameworks"),
        ("jQuery", "javascript_libraries"),
        ("jQuery UI", "javascript_libraries"),
        ("Lodash", "javascript_libraries"),
        ("Google Analytics", "analytics"),
        ("Matomo", "analytics"),
        ("Hotjar", "analytics"),
        ("Nginx", "web_servers"),
        ("Apache", "web_servers"),
        ("Microsoft IIS", "web_servers"),
        ("LiteSpeed", "web_servers"),
        ("Cloudflare", "cdn"),
        ("Fastly", "cdn"),
        ("Akamai", "cdn"),
        ("Amazon CloudFront", "cdn"),
        ("PHP", "programming_languages"),
        ("Python", "programming_languages"),
        ("Ruby", "programming_languages"),
        ("Java", "programming_languages"),
        ("Node.js", "programming_languages"),
        ("MySQL", "databases"),
        ("PostgreSQL", "databases"),
        ("MariaDB", "databases"),
        ("Bootstrap", "ui_frameworks"),
        ("Tailwind CSS", "ui_frameworks"),
        ("Stripe", "payment_processors"),
        ("PayPal", "payment_processors"),
        ("reCAPTCHA", "security"),
        ("HSTS", "security"),
    ])
});

/// Category slug -> human-readable display name.
static DISPLAY_NAMES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("cms", "CMS"),
        ("ecommerce", "E-commerce"),
        ("javascript_frameworks", "JavaScript Frameworks"),
        ("javascript_libraries", "JavaScript Libraries"),
        ("analytics", "Analytics"),
        ("web_servers", "Web Servers"),
        ("cdn", "CDN"),
        ("programming_languages", "Programming Languages"),
        ("databases", "Databases"),
        ("ui_frameworks", "UI Frameworks"),
        ("payment_processors", "Payment Processors"),
        ("security", "Security"),
        ("miscellaneous", "Miscellaneous"),
    ])
});

/// One normalized output category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryBucket {
    /// Normalized category slug.
    pub slug: String,
    /// Deduplicated technology names, sorted ascending (ordinal).
    pub technologies: Vec<String>,
    /// Mean of the category's per-technology confidences, 2 decimals.
    pub confidence: f64,
}

/// Normalized classification result for one request.
///
/// Categories appear in first-seen insertion order and never re-sort
/// relative to each other, so the bucket list is a `Vec`, not a map.
/// Computed fresh per request; never persisted or cached.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedResult {
    /// Output categories in first-seen order.
    pub categories: Vec<CategoryBucket>,
    /// Number of input detections before per-category deduplication.
    pub raw_count: usize,
}

impl NormalizedResult {
    /// Keyed bucket lookup.
    pub fn bucket(&self, slug: &str) -> Option<&CategoryBucket> {
        self.categories.iter().find(|b| b.slug == slug)
    }

    /// Keyed confidence lookup.
    pub fn confidence(&self, slug: &str) -> Option<f64> {
        self.bucket(slug).map(|b| b.confidence)
    }
}

/// Derives a category slug from a raw database category name.
///
/// Lowercases the name and replaces runs of whitespace with underscores,
/// e.g. "Web Servers" -> "web_servers". A derived slug can collide with an
/// override slug for an unrelated category; the observed upstream behavior
/// is preserved here rather than namespaced away.
pub fn slugify(category: &str) -> String {
    category
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Resolves the display name for a category slug.
///
/// Pure read-only lookup; unmapped slugs display as themselves.
pub fn display_name(slug: &str) -> String {
    DISPLAY_NAMES
        .get(slug)
        .map(|name| name.to_string())
        .unwrap_or_else(|| slug.to_string())
}

/// Normalizes a resolved detection set.
///
/// Category resolution per detection: override table by technology name
/// first, slugified database category otherwise. Within a category,
/// technology names are deduplicated by exact match and each technology
/// contributes its confidence once; the final per-category confidence is the
/// arithmetic mean rounded half-up to 2 decimal places.
pub fn normalize(detections: &[Detection]) -> NormalizedResult {
    // Slug -> (names in arrival order, confidences); slug arrival order kept
    // separately since output must preserve first-seen category order
    let mut order: Vec<String> = Vec::new();
    let mut names: HashMap<String, Vec<String>> = HashMap::new();
    let mut confidences: HashMap<String, Vec<f64>> = HashMap::new();

    for detection in detections {
        let slug = CATEGORY_OVERRIDES
            .get(detection.technology.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| slugify(&detection.category));

        if !names.contains_key(&slug) {
            order.push(slug.clone());
        }
        let bucket_names = names.entry(slug.clone()).or_default();
        if bucket_names.contains(&detection.technology) {
            continue;
        }
        bucket_names.push(detection.technology.clone());
        confidences
            .entry(slug)
            .or_default()
            .push(detection.confidence);
    }

    let categories = order
        .into_iter()
        .map(|slug| {
            let mut technologies = names.remove(&slug).unwrap_or_default();
            technologies.sort();
            let values = confidences.remove(&slug).unwrap_or_default();
            let confidence = if values.is_empty() {
                0.0
            } else {
                round_half_up(values.iter().sum::<f64>() / values.len() as f64)
            };
            CategoryBucket {
                slug,
                technologies,
                confidence,
            }
        })
        .collect();

    NormalizedResult {
        categories,
        raw_count: detections.len(),
    }
}

/// Rounds to 2 decimals, half-up.
///
/// `f64::round` rounds half away from zero, which is half-up on the
/// non-negative confidence domain.
fn round_half_up(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
