//! Fallible pattern compilation.
//!
//! Fingerprint patterns are case-insensitive regular expressions with two
//! quirks inherited from community rulesets:
//! - an empty pattern string means "presence is a match regardless of value"
//! - patterns may carry `\;version:` / `\;confidence:` tails, which are
//!   matching metadata and must be stripped before compilation
//!
//! Compilation is an explicit fallible step: an uncompilable pattern yields
//! `None` ("never matches") and never aborts loading of other patterns.

use regex::{Regex, RegexBuilder};

/// A compiled matcher for one fingerprint pattern.
#[derive(Debug, Clone)]
pub enum PatternMatcher {
    /// Empty source pattern: key presence alone is a match, any value.
    Presence,
    /// Compiled case-insensitive regex tested against the evidence value.
    Regex(Regex),
}

impl PatternMatcher {
    /// Compiles a ruleset pattern, returning `None` when the regex is
    /// invalid. Callers treat `None` as "never matches" and move on.
    pub fn compile(pattern: &str) -> Option<Self> {
        let source = strip_pattern_tail(pattern);
        if source.is_empty() {
            return Some(PatternMatcher::Presence);
        }
        match RegexBuilder::new(source).case_insensitive(true).build() {
            Ok(re) => Some(PatternMatcher::Regex(re)),
            Err(e) => {
                log::debug!("Skipping uncompilable pattern '{}': {}", pattern, e);
                None
            }
        }
    }

    /// Tests the matcher against an evidence value.
    ///
    /// `Presence` matches any value; the caller is responsible for only
    /// invoking it when the keyed evidence actually exists.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            PatternMatcher::Presence => true,
            PatternMatcher::Regex(re) => re.is_match(text),
        }
    }

    /// Whether this matcher is presence-only (empty source pattern).
    pub fn is_presence(&self) -> bool {
        matches!(self, PatternMatcher::Presence)
    }
}

/// Strips the `\;version:...` / `\;confidence:...` tail from a pattern.
///
/// Wappalyzer rules append extraction metadata after a literal `\;`
/// separator; only the leading segment is the actual match expression.
fn strip_pattern_tail(pattern: &str) -> &str {
    pattern.split("\\;").next().unwrap_or(pattern)
}
