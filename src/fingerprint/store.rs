//! Load-once fingerprint store.
//!
//! The store is built from a serialized payload at process start, compiles
//! every rule's patterns exactly once, and is immutable afterwards: it is
//! shared by reference across all concurrent requests. A malformed payload or
//! a missing required top-level key is fatal; an individual bad pattern is
//! skipped and never aborts the load.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::config::FALLBACK_CATEGORY;
use crate::error_handling::{ErrorStats, ErrorType, StoreLoadError};
use crate::fingerprint::models::{CategoryEntry, FingerprintRule};
use crate::fingerprint::patterns::PatternMatcher;

/// One technology's rule with all patterns compiled.
///
/// Header and meta keys are lowercased at compile time to line up with the
/// snapshot's normalized maps; cookie names keep their exact spelling since
/// cookie lookup is exact-name.
#[derive(Debug, Clone, Default)]
pub struct CompiledRule {
    /// Category IDs, priority-ordered; first is primary.
    pub cats: Vec<u32>,
    /// Lowercase header name -> matcher.
    pub headers: Vec<(String, PatternMatcher)>,
    /// Exact cookie name -> matcher.
    pub cookies: Vec<(String, PatternMatcher)>,
    /// Lowercase meta name -> matchers (any hit counts).
    pub meta: Vec<(String, Vec<PatternMatcher>)>,
    /// Script URL matchers (any script URL hit counts).
    pub script: Vec<PatternMatcher>,
    /// Full-HTML matchers.
    pub html: Vec<PatternMatcher>,
    /// Implied technology names.
    pub implies: Vec<String>,
}

impl CompiledRule {
    /// Whether this rule carries no usable evidence patterns at all.
    ///
    /// Such a rule can never match directly; it may still be reached through
    /// an implication edge.
    pub fn is_unmatchable(&self) -> bool {
        self.headers.is_empty()
            && self.cookies.is_empty()
            && self.meta.is_empty()
            && self.script.is_empty()
            && self.html.is_empty()
    }
}

/// The technology signature database, read-only after load.
///
/// Rules are indexed in a `BTreeMap` so every run evaluates technologies in
/// the same (sorted-name) order, which keeps downstream category ordering
/// deterministic.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    rules: BTreeMap<String, CompiledRule>,
    categories: HashMap<u32, String>,
}

impl FingerprintStore {
    /// Parses and compiles a fingerprint payload.
    ///
    /// Fails fast on a malformed document or when either required top-level
    /// key (`technologies`, `categories`) is absent. Individual patterns
    /// that fail to compile are dropped with a debug log; they never abort
    /// the load.
    pub fn load(bytes: &[u8]) -> Result<Self, StoreLoadError> {
        Self::load_inner(bytes, None)
    }

    /// Like [`FingerprintStore::load`] but records skipped patterns in the
    /// run's incident counters.
    pub fn load_with_stats(bytes: &[u8], stats: &ErrorStats) -> Result<Self, StoreLoadError> {
        Self::load_inner(bytes, Some(stats))
    }

    /// Reads and loads a payload from disk.
    pub async fn load_from_path(
        path: &Path,
        stats: Option<&ErrorStats>,
    ) -> Result<Self, StoreLoadError> {
        let bytes = tokio::fs::read(path).await?;
        Self::load_inner(&bytes, stats)
    }

    fn load_inner(bytes: &[u8], stats: Option<&ErrorStats>) -> Result<Self, StoreLoadError> {
        let raw: serde_json::Value = serde_json::from_slice(bytes)?;

        let technologies = raw
            .get("technologies")
            .ok_or(StoreLoadError::MissingKey("technologies"))?;
        let categories = raw
            .get("categories")
            .ok_or(StoreLoadError::MissingKey("categories"))?;

        let technologies: HashMap<String, FingerprintRule> =
            serde_json::from_value(technologies.clone())?;
        let categories: HashMap<String, CategoryEntry> =
            serde_json::from_value(categories.clone())?;

        // Category IDs arrive as string keys; non-numeric IDs are skipped
        let categories: HashMap<u32, String> = categories
            .into_iter()
            .filter_map(|(id, entry)| id.parse::<u32>().ok().map(|id| (id, entry.name)))
            .collect();

        let mut skipped_patterns = 0usize;
        let mut rules = BTreeMap::new();
        for (name, rule) in technologies {
            let compiled = compile_rule(&rule, &mut skipped_patterns);
            rules.insert(name, compiled);
        }

        if skipped_patterns > 0 {
            log::warn!(
                "Skipped {} uncompilable fingerprint pattern(s); affected patterns never match",
                skipped_patterns
            );
            if let Some(stats) = stats {
                for _ in 0..skipped_patterns {
                    stats.increment(ErrorType::PatternCompileError);
                }
            }
        }

        log::info!(
            "Loaded fingerprint store: {} technologies, {} categories",
            rules.len(),
            categories.len()
        );

        Ok(FingerprintStore { rules, categories })
    }

    /// Iterates rules in sorted technology-name order.
    pub fn rules(&self) -> impl Iterator<Item = (&str, &CompiledRule)> {
        self.rules.iter().map(|(name, rule)| (name.as_str(), rule))
    }

    /// Looks up a rule by exact technology name.
    pub fn rule(&self, name: &str) -> Option<&CompiledRule> {
        self.rules.get(name)
    }

    /// Resolves a category ID to the store's display name.
    pub fn category_name(&self, id: u32) -> Option<&str> {
        self.categories.get(&id).map(String::as_str)
    }

    /// Resolves a rule's primary category name.
    ///
    /// The first category ID wins; an ID absent from the category table (or
    /// a rule with no categories) falls back to "Miscellaneous".
    pub fn primary_category(&self, rule: &CompiledRule) -> String {
        rule.cats
            .first()
            .and_then(|id| self.category_name(*id))
            .unwrap_or(FALLBACK_CATEGORY)
            .to_string()
    }

    /// Number of technologies in the store.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the store holds no technologies.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_rule(rule: &FingerprintRule, skipped: &mut usize) -> CompiledRule {
    let mut compile = |pattern: &str| -> Option<PatternMatcher> {
        let matcher = PatternMatcher::compile(pattern);
        if matcher.is_none() {
            *skipped += 1;
        }
        matcher
    };

    let headers = rule
        .headers
        .iter()
        .filter_map(|(name, pattern)| compile(pattern).map(|m| (name.to_lowercase(), m)))
        .collect();

    let cookies = rule
        .cookies
        .iter()
        .filter_map(|(name, pattern)| compile(pattern).map(|m| (name.clone(), m)))
        .collect();

    let meta = rule
        .meta
        .iter()
        .filter_map(|(name, patterns)| {
            let matchers: Vec<PatternMatcher> =
                patterns.iter().filter_map(|p| compile(p)).collect();
            if matchers.is_empty() {
                None
            } else {
                Some((name.to_lowercase(), matchers))
            }
        })
        .collect();

    let script = rule.script.iter().filter_map(|p| compile(p)).collect();
    let html = rule.html.iter().filter_map(|p| compile(p)).collect();

    CompiledRule {
        cats: rule.cats.clone(),
        headers,
        cookies,
        meta,
        script,
        html,
        implies: rule.implies.clone(),
    }
}
