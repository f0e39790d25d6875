//! Normalized page snapshot.
//!
//! A `PageSnapshot` is the single input the detection pipeline consumes: one
//! immutable capture of a fetched page's headers, HTML, script sources, meta
//! tags, and cookies, plus a marker recording which acquisition tier produced
//! it. It is built once per request by the acquisition layer and never
//! mutated afterwards.

use std::collections::HashMap;

use serde::Serialize;

/// Acquisition strategy that produced a snapshot.
///
/// `Light` is the cheap HTTP fetch; `Rendered` is the richer tier used when
/// the escalation policy decides the light snapshot is not representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchTier {
    /// Plain HTTP fetch of the raw document.
    Light,
    /// Richer acquisition (e.g. a rendering fetch) after escalation.
    Rendered,
}

/// Immutable capture of one fetched page.
///
/// Header and meta-tag names are normalized to lowercase at construction so
/// the match engine can do direct lookups. Cookies are kept as raw
/// `name=value` strings; the match engine splits them on the first `=`.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code of the final response.
    pub status: u16,
    /// Response headers, lowercase name -> value.
    pub headers: HashMap<String, String>,
    /// Raw HTML text of the response body.
    pub html: String,
    /// External script URLs in document order.
    pub scripts: Vec<String>,
    /// Meta tags, lowercase name -> content.
    pub meta: HashMap<String, String>,
    /// Raw `name=value` cookie strings from `Set-Cookie` headers.
    pub cookies: Vec<String>,
    /// Which acquisition strategy produced this snapshot.
    pub tier: FetchTier,
}

impl PageSnapshot {
    /// Builds a snapshot, normalizing header and meta keys to lowercase.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        final_url: String,
        status: u16,
        headers: HashMap<String, String>,
        html: String,
        scripts: Vec<String>,
        meta: HashMap<String, String>,
        cookies: Vec<String>,
        tier: FetchTier,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        let meta = meta
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        PageSnapshot {
            final_url,
            status,
            headers,
            html,
            scripts,
            meta,
            cookies,
            tier,
        }
    }

    /// Returns an empty snapshot for the given URL, useful in tests and as a
    /// building block for snapshot construction.
    pub fn empty(url: &str, tier: FetchTier) -> Self {
        PageSnapshot {
            final_url: url.to_string(),
            status: 0,
            headers: HashMap::new(),
            html: String::new(),
            scripts: Vec::new(),
            meta: HashMap::new(),
            cookies: Vec::new(),
            tier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Header and meta keys must be lowercased at construction.
    #[test]
    fn test_new_normalizes_keys() {
        let mut headers = HashMap::new();
        headers.insert("X-Powered-By".to_string(), "PHP/8.2".to_string());
        let mut meta = HashMap::new();
        meta.insert("Generator".to_string(), "WordPress 6.4".to_string());

        let snapshot = PageSnapshot::new(
            "https://example.com/".to_string(),
            200,
            headers,
            String::new(),
            vec![],
            meta,
            vec![],
            FetchTier::Light,
        );

        assert_eq!(
            snapshot.headers.get("x-powered-by"),
            Some(&"PHP/8.2".to_string())
        );
        assert_eq!(
            snapshot.meta.get("generator"),
            Some(&"WordPress 6.4".to_string())
        );
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = PageSnapshot::empty("https://example.com/", FetchTier::Light);
        assert_eq!(snapshot.final_url, "https://example.com/");
        assert_eq!(snapshot.status, 0);
        assert!(snapshot.headers.is_empty());
        assert_eq!(snapshot.tier, FetchTier::Light);
    }

    #[test]
    fn test_fetch_tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FetchTier::Light).unwrap(), "\"light\"");
        assert_eq!(
            serde_json::to_string(&FetchTier::Rendered).unwrap(),
            "\"rendered\""
        );
    }
}
