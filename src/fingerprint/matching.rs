//! The match engine.
//!
//! Turns one immutable [`PageSnapshot`] plus the fingerprint store into a set
//! of raw detections. Evidence kinds are tried per technology in a fixed
//! priority order (header, cookie, script, html, meta) and evaluation
//! short-circuits for that technology at the first kind that matches; the
//! recorded evidence source is only the kind that fired. Technologies are
//! otherwise evaluated independently and exhaustively: a match (or a broken
//! pattern) in one rule never affects another.

use serde::Serialize;

use crate::fingerprint::store::{CompiledRule, FingerprintStore};
use crate::snapshot::PageSnapshot;

/// Evidence kind that produced a detection.
///
/// Variant order is the match priority order for direct evidence; `Implied`
/// is only ever assigned by the implication resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceSource {
    /// Response header name/value.
    Header,
    /// `Set-Cookie` name/value pair.
    Cookie,
    /// External script URL.
    Script,
    /// Raw HTML body.
    Html,
    /// Meta tag name/content.
    Meta,
    /// Added by implication closure, not matched directly.
    Implied,
}

/// Direct evidence kinds in match priority order.
const DIRECT_KINDS: [EvidenceSource; 5] = [
    EvidenceSource::Header,
    EvidenceSource::Cookie,
    EvidenceSource::Script,
    EvidenceSource::Html,
    EvidenceSource::Meta,
];

/// One matched technology.
///
/// At most one detection exists per technology name within a run; the match
/// engine's per-technology short-circuit guarantees it for direct matches and
/// the implication resolver preserves it for implied ones.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    /// Technology name (unique key within a run).
    pub technology: String,
    /// Category name resolved from the rule's primary category ID.
    pub category: String,
    /// Confidence in [0.0, 1.0]; direct and implied matches are 1.0.
    pub confidence: f64,
    /// Evidence kind that produced this detection.
    pub source: EvidenceSource,
}

/// Matches every technology in the store against one snapshot.
///
/// Returns detections in deterministic (sorted technology name) order, which
/// downstream stages rely on for stable category ordering.
pub fn match_snapshot(snapshot: &PageSnapshot, store: &FingerprintStore) -> Vec<Detection> {
    let cookies = parse_cookies(&snapshot.cookies);
    let mut detections = Vec::new();

    for (name, rule) in store.rules() {
        for kind in DIRECT_KINDS {
            if !kind_matches(kind, rule, snapshot, &cookies) {
                continue;
            }
            log::debug!(
                "Matched technology '{}' via {:?} evidence on {}",
                name,
                kind,
                snapshot.final_url
            );
            detections.push(Detection {
                technology: name.to_string(),
                category: store.primary_category(rule),
                confidence: 1.0,
                source: kind,
            });
            // Remaining kinds for this technology are not checked
            break;
        }
    }

    detections
}

fn kind_matches(
    kind: EvidenceSource,
    rule: &CompiledRule,
    snapshot: &PageSnapshot,
    cookies: &[(String, String)],
) -> bool {
    match kind {
        EvidenceSource::Header => matches_headers(rule, snapshot),
        EvidenceSource::Cookie => matches_cookies(rule, cookies),
        EvidenceSource::Script => matches_scripts(rule, snapshot),
        EvidenceSource::Html => matches_html(rule, snapshot),
        EvidenceSource::Meta => matches_meta(rule, snapshot),
        // Never produced by direct matching
        EvidenceSource::Implied => false,
    }
}

/// Header evidence: lookup by lowercase header name; presence-only patterns
/// match regardless of value.
fn matches_headers(rule: &CompiledRule, snapshot: &PageSnapshot) -> bool {
    rule.headers.iter().any(|(name, matcher)| {
        snapshot
            .headers
            .get(name)
            .map(|value| matcher.matches(value))
            .unwrap_or(false)
    })
}

/// Cookie evidence: the rule must carry a pattern for the exact cookie name.
fn matches_cookies(rule: &CompiledRule, cookies: &[(String, String)]) -> bool {
    rule.cookies.iter().any(|(rule_name, matcher)| {
        cookies
            .iter()
            .any(|(name, value)| name == rule_name && matcher.matches(value))
    })
}

/// Script evidence: any pattern hitting any recorded script URL.
fn matches_scripts(rule: &CompiledRule, snapshot: &PageSnapshot) -> bool {
    rule.script
        .iter()
        .any(|matcher| snapshot.scripts.iter().any(|src| matcher.matches(src)))
}

/// HTML evidence: any pattern hitting the full HTML text.
fn matches_html(rule: &CompiledRule, snapshot: &PageSnapshot) -> bool {
    rule.html.iter().any(|matcher| matcher.matches(&snapshot.html))
}

/// Meta evidence: lookup by lowercase meta name; any listed pattern hitting
/// the content value is a match.
fn matches_meta(rule: &CompiledRule, snapshot: &PageSnapshot) -> bool {
    rule.meta.iter().any(|(name, matchers)| {
        snapshot
            .meta
            .get(name)
            .map(|value| matchers.iter().any(|m| m.matches(value)))
            .unwrap_or(false)
    })
}

/// Splits raw `name=value` cookie strings on the first `=`.
///
/// Strings without a `=` are ignored; values keep any further `=` characters.
fn parse_cookies(raw: &[String]) -> Vec<(String, String)> {
    raw.iter()
        .filter_map(|cookie| {
            cookie.split_once('=').map(|(name, value)| {
                (name.trim().to_string(), value.trim().to_string())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FetchTier;
    use std::collections::HashMap;

    fn store_from(payload: &str) -> FingerprintStore {
        FingerprintStore::load(payload.as_bytes()).expect("test payload must load")
    }

    fn snapshot() -> PageSnapshot {
        PageSnapshot::empty("https://example.com/", FetchTier::Light)
    }

    /// Header evidence outranks cookie evidence when both would match.
    #[test]
    fn test_evidence_priority_header_before_cookie() {
        let store = store_from(
            r#"{
                "technologies": {
                    "Both": {
                        "cats": [1],
                        "headers": {"X-Both": "yes"},
                        "cookies": {"both_cookie": "yes"}
                    }
                },
                "categories": {"1": {"name": "CMS"}}
            }"#,
        );
        let mut snap = snapshot();
        snap.headers.insert("x-both".to_string(), "yes".to_string());
        snap.cookies.push("both_cookie=yes".to_string());

        let detections = match_snapshot(&snap, &store);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].source, EvidenceSource::Header);
    }

    /// Empty-string patterns match on key presence alone, any value.
    #[test]
    fn test_presence_only_patterns() {
        let store = store_from(
            r#"{
                "technologies": {
                    "HeaderTech": {"headers": {"X-Custom": ""}},
                    "CookieTech": {"cookies": {"sid": ""}},
                    "MetaTech": {"meta": {"generator": ""}}
                },
                "categories": {}
            }"#,
        );
        let mut snap = snapshot();
        snap.headers
            .insert("x-custom".to_string(), "whatever value".to_string());
        snap.cookies.push("sid=opaque".to_string());
        snap.meta
            .insert("generator".to_string(), "AnythingAtAll".to_string());

        let detections = match_snapshot(&snap, &store);
        let names: Vec<&str> = detections.iter().map(|d| d.technology.as_str()).collect();
        assert_eq!(names, vec!["CookieTech", "HeaderTech", "MetaTech"]);
    }

    /// A presence-only pattern must not match when the key is absent.
    #[test]
    fn test_presence_requires_key() {
        let store = store_from(
            r#"{
                "technologies": {"HeaderTech": {"headers": {"X-Custom": ""}}},
                "categories": {}
            }"#,
        );
        let detections = match_snapshot(&snapshot(), &store);
        assert!(detections.is_empty());
    }

    /// One rule's invalid regex never prevents detection of another rule.
    #[test]
    fn test_bad_pattern_does_not_block_other_technologies() {
        let store = store_from(
            r#"{
                "technologies": {
                    "Broken": {"html": "([unclosed"},
                    "Valid": {"html": "powered by valid"}
                },
                "categories": {}
            }"#,
        );
        let mut snap = snapshot();
        snap.html = "<html><body>Powered by Valid</body></html>".to_string();

        let detections = match_snapshot(&snap, &store);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].technology, "Valid");
    }

    /// Script patterns test every recorded script URL.
    #[test]
    fn test_script_match_any_url() {
        let store = store_from(
            r#"{
                "technologies": {"jQuery": {"cats": [59], "script": "jquery[.-]"}},
                "categories": {"59": {"name": "JavaScript libraries"}}
            }"#,
        );
        let mut snap = snapshot();
        snap.scripts = vec![
            "https://example.com/app.js".to_string(),
            "https://cdn.example.com/jquery-3.6.0.min.js".to_string(),
        ];

        let detections = match_snapshot(&snap, &store);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].source, EvidenceSource::Script);
        assert_eq!(detections[0].category, "JavaScript libraries");
    }

    /// Cookie matching splits raw strings on the first `=` only.
    #[test]
    fn test_cookie_value_with_equals() {
        let store = store_from(
            r#"{
                "technologies": {"Laravel": {"cookies": {"laravel_session": "^eyJ"}}},
                "categories": {}
            }"#,
        );
        let mut snap = snapshot();
        snap.cookies
            .push("laravel_session=eyJpdiI6=extra=chunks".to_string());

        let detections = match_snapshot(&snap, &store);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].source, EvidenceSource::Cookie);
    }

    /// Matching is case-insensitive across evidence kinds.
    #[test]
    fn test_case_insensitive_matching() {
        let store = store_from(
            r#"{
                "technologies": {"Nginx": {"cats": [22], "headers": {"Server": "nginx"}}},
                "categories": {"22": {"name": "Web Servers"}}
            }"#,
        );
        let mut snap = snapshot();
        snap.headers
            .insert("server".to_string(), "NGINX/1.18.0".to_string());

        let detections = match_snapshot(&snap, &store);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 1.0);
    }

    /// A rule whose category ID is missing from the table gets the fallback.
    #[test]
    fn test_missing_category_id_falls_back() {
        let store = store_from(
            r#"{
                "technologies": {"Mystery": {"cats": [999], "html": "mystery-marker"}},
                "categories": {}
            }"#,
        );
        let mut snap = snapshot();
        snap.html = "has a mystery-marker inside".to_string();

        let detections = match_snapshot(&snap, &store);
        assert_eq!(detections[0].category, "Miscellaneous");
    }

    /// All technologies are evaluated; there is no early exit across rules.
    #[test]
    fn test_multiple_technologies_detected() {
        let store = store_from(
            r#"{
                "technologies": {
                    "A": {"html": "marker-a"},
                    "B": {"html": "marker-b"},
                    "C": {"html": "marker-missing"}
                },
                "categories": {}
            }"#,
        );
        let mut snap = snapshot();
        snap.html = "marker-a and marker-b".to_string();

        let detections = match_snapshot(&snap, &store);
        let names: Vec<&str> = detections.iter().map(|d| d.technology.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_parse_cookies_ignores_malformed() {
        let raw = vec![
            "good=value".to_string(),
            "no-equals-here".to_string(),
            " padded = spaced ".to_string(),
        ];
        let parsed = parse_cookies(&raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], ("good".to_string(), "value".to_string()));
        assert_eq!(parsed[1], ("padded".to_string(), "spaced".to_string()));
    }
}
