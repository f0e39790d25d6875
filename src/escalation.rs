//! Fetch-tier escalation policy.
//!
//! Decides from a light-tier snapshot whether the page needs a rendered
//! fetch before fingerprinting. Pure functions over the snapshot body; no
//! I/O and no state, so the pipeline can call this between tiers without
//! holding anything.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::MIN_VISIBLE_BODY_CHARS;
use crate::snapshot::PageSnapshot;

/// Empty client-side mount point, e.g. `<div id="root"></div>` with nothing
/// but whitespace inside. Covers the common React/generic/Next.js ids.
static EMPTY_MOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div[^>]*\bid\s*=\s*["'](?:root|app|__next)["'][^>]*>\s*</div>"#)
        .expect("mount point regex is valid")
});

/// `<noscript>` block warning that JavaScript is required.
static NOSCRIPT_WARNING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<noscript[^>]*>.*?(?:enable\s+javascript|javascript\s+is\s+required).*?</noscript>",
    )
    .expect("noscript regex is valid")
});

/// Inner content of the `<body>` element.
static BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<body[^>]*>(.*?)</body>").expect("body regex is valid"));

/// Inline and external script blocks, stripped before measuring visible text.
static SCRIPT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("script block regex is valid")
});

/// Remaining markup tags, stripped after script removal.
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"));

/// Why a snapshot was escalated to the rendered tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// An empty SPA mount point div was found.
    EmptyMountPoint,
    /// A `<noscript>` block warns that JavaScript must be enabled.
    NoscriptWarning,
    /// Too little visible text once scripts and tags are stripped.
    ThinBody,
}

/// Returns the first matching escalation trigger, if any.
///
/// Triggers are checked cheapest-first; any single hit escalates. A `None`
/// means the light-tier snapshot is good enough to fingerprint directly.
pub fn needs_render(snapshot: &PageSnapshot) -> Option<EscalationReason> {
    let html = &snapshot.html;

    if EMPTY_MOUNT_RE.is_match(html) {
        return Some(EscalationReason::EmptyMountPoint);
    }
    if NOSCRIPT_WARNING_RE.is_match(html) {
        return Some(EscalationReason::NoscriptWarning);
    }
    if visible_char_count(html) < MIN_VISIBLE_BODY_CHARS {
        return Some(EscalationReason::ThinBody);
    }
    None
}

/// Counts non-whitespace characters in the body after removing script
/// blocks and markup tags.
///
/// Measures the `<body>` element's content when one can be found; a
/// document without a body tag (or an unclosed one) is measured whole.
fn visible_char_count(html: &str) -> usize {
    let body = BODY_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(html);
    let without_scripts = SCRIPT_BLOCK_RE.replace_all(body, " ");
    let text = TAG_RE.replace_all(&without_scripts, " ");
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::FetchTier;

    fn snapshot(html: &str) -> PageSnapshot {
        let mut snap = PageSnapshot::empty("https://example.com/", FetchTier::Light);
        snap.html = html.to_string();
        snap
    }

    fn filler(chars: usize) -> String {
        "lorem ipsum dolor sit amet consectetur "
            .chars()
            .cycle()
            .take(chars * 2)
            .collect()
    }

    /// An empty root div escalates even when the rest of the body is rich.
    #[test]
    fn test_empty_root_mount_escalates() {
        let html = format!(r#"<body><div id="root"></div><p>{}</p></body>"#, filler(300));
        assert_eq!(
            needs_render(&snapshot(&html)),
            Some(EscalationReason::EmptyMountPoint)
        );
    }

    #[test]
    fn test_mount_with_whitespace_only_escalates() {
        let html = format!(
            "<div id=\"__next\">\n\t </div><p>{}</p>",
            filler(300)
        );
        assert_eq!(
            needs_render(&snapshot(&html)),
            Some(EscalationReason::EmptyMountPoint)
        );
    }

    /// A mount point with real content inside is not an escalation trigger.
    #[test]
    fn test_populated_mount_does_not_escalate() {
        let html = format!(r#"<div id="app"><p>{}</p></div>"#, filler(300));
        assert_eq!(needs_render(&snapshot(&html)), None);
    }

    #[test]
    fn test_noscript_warning_escalates() {
        let html = format!(
            "<noscript>Please enable JavaScript to view this site.</noscript><p>{}</p>",
            filler(300)
        );
        assert_eq!(
            needs_render(&snapshot(&html)),
            Some(EscalationReason::NoscriptWarning)
        );
    }

    /// Scripts do not count toward visible body text.
    #[test]
    fn test_thin_body_escalates() {
        let html = format!(
            "<html><body><script>{}</script><p>short</p></body></html>",
            filler(500)
        );
        assert_eq!(
            needs_render(&snapshot(&html)),
            Some(EscalationReason::ThinBody)
        );
    }

    #[test]
    fn test_substantial_body_does_not_escalate() {
        let html = format!("<html><body><p>{}</p></body></html>", filler(300));
        assert_eq!(needs_render(&snapshot(&html)), None);
    }

    /// Malformed markup never panics; unclosed tags just strip oddly.
    #[test]
    fn test_malformed_html_is_safe() {
        let html = "<div id=root ><script src=<p>broken";
        let _ = needs_render(&snapshot(html));
    }

    #[test]
    fn test_visible_char_count_strips_tags_and_scripts() {
        let html = "<p>abc</p><script>var x = 12345;</script><b>de</b>";
        assert_eq!(visible_char_count(html), 5);
    }
}
