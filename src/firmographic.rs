//! Firmographic inference from a page snapshot.
//!
//! Best-effort company signals: a country guess from the registrable
//! domain's country-code TLD, and the owner/year scraped from a copyright
//! line in the page footer. Every field degrades to `None` on failure;
//! nothing here can abort a request.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tldextract::TldExtractor;

/// Country-code TLD label -> country name.
static CCTLD_COUNTRIES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("uk", "United Kingdom"),
        ("de", "Germany"),
        ("fr", "France"),
        ("nl", "Netherlands"),
        ("it", "Italy"),
        ("es", "Spain"),
        ("se", "Sweden"),
        ("no", "Norway"),
        ("dk", "Denmark"),
        ("fi", "Finland"),
        ("ch", "Switzerland"),
        ("at", "Austria"),
        ("be", "Belgium"),
        ("pl", "Poland"),
        ("ie", "Ireland"),
        ("pt", "Portugal"),
        ("cz", "Czechia"),
        ("ca", "Canada"),
        ("us", "United States"),
        ("mx", "Mexico"),
        ("br", "Brazil"),
        ("au", "Australia"),
        ("nz", "New Zealand"),
        ("jp", "Japan"),
        ("cn", "China"),
        ("kr", "South Korea"),
        ("in", "India"),
        ("ru", "Russia"),
        ("tr", "Turkey"),
        ("za", "South Africa"),
    ])
});

/// Copyright line: a marker, optional year or year range, optional "by",
/// then the owner text up to a sentence or markup boundary.
static COPYRIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:©|&copy;|\(c\)|copyright)\s*(?:©\s*)?((?:19|20)\d{2})?(?:\s*[-–]\s*((?:19|20)\d{2}))?\s*(?:by\s+)?([^.|<\n\r]{2,80})?",
    )
    .expect("copyright regex is valid")
});

/// Markup tags, stripped before scanning for the copyright line.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"));

/// Boilerplate suffix trimmed off the scraped owner text.
static BOILERPLATE_TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)all rights(?:\s+reserved)?").expect("tail regex is valid"));

/// Inferred company signals. All fields are best-effort.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Firmographics {
    /// Country guess from the domain's ccTLD, if it has one.
    pub country: Option<String>,
    /// Owner name scraped from the copyright line.
    pub copyright_owner: Option<String>,
    /// Most recent year in the copyright line.
    pub copyright_year: Option<u16>,
}

impl Firmographics {
    /// True when no signal was inferred at all.
    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.copyright_owner.is_none() && self.copyright_year.is_none()
    }
}

/// Infers firmographics from the final URL and snapshot HTML.
///
/// Never fails; fields that cannot be inferred stay `None`.
pub fn infer(extractor: &TldExtractor, final_url: &str, html: &str) -> Firmographics {
    let country = country_from_tld(extractor, final_url);
    let (copyright_owner, copyright_year) = scrape_copyright(html);
    Firmographics {
        country,
        copyright_owner,
        copyright_year,
    }
}

/// Maps the last label of the domain suffix to a country name.
///
/// Multi-part suffixes like "co.uk" resolve by their final label. Generic
/// TLDs (com, org, io, ...) yield no country.
fn country_from_tld(extractor: &TldExtractor, final_url: &str) -> Option<String> {
    let result = match extractor.extract(final_url) {
        Ok(result) => result,
        Err(e) => {
            log::debug!("TLD extraction failed for {}: {}", final_url, e);
            return None;
        }
    };
    let suffix = result.suffix?;
    let label = suffix.rsplit('.').next()?;
    CCTLD_COUNTRIES.get(label).map(|name| name.to_string())
}

/// Scrapes the owner and most recent year from a copyright line.
fn scrape_copyright(html: &str) -> (Option<String>, Option<u16>) {
    let text = TAG_RE.replace_all(html, " ");
    let Some(caps) = COPYRIGHT_RE.captures(&text) else {
        return (None, None);
    };

    // Year ranges like "2010-2024" report the later year
    let year = caps
        .get(2)
        .or_else(|| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok());

    let owner = caps.get(3).map(|m| clean_owner(m.as_str()));
    (owner.filter(|o| !o.is_empty()), year)
}

/// Trims boilerplate tails like "All rights reserved" off the owner text.
fn clean_owner(raw: &str) -> String {
    let mut owner = raw.trim();
    // Match offsets come from the same string being sliced; lowercasing a
    // copy first can shift byte positions for some Unicode characters.
    if let Some(m) = BOILERPLATE_TAIL_RE.find(owner) {
        owner = owner[..m.start()].trim();
    }
    owner
        .trim_matches(|c: char| c == ',' || c == '-' || c.is_whitespace())
        .to_string()
}
