//! Technology fingerprinting: signature store, match engine, and
//! implication resolution.
//!
//! The flow is strictly downstream: a [`FingerprintStore`] is loaded once at
//! startup; per request, [`match_snapshot`] turns a page snapshot into raw
//! detections and [`resolve_implications`] expands them to closure over the
//! store's "implies" edges. Taxonomic normalization lives in
//! [`crate::taxonomy`].

mod implies;
mod matching;
mod models;
mod patterns;
mod store;

pub use implies::resolve_implications;
pub use matching::{match_snapshot, Detection, EvidenceSource};
pub use models::{CategoryEntry, FingerprintRule};
pub use patterns::PatternMatcher;
pub use store::{CompiledRule, FingerprintStore};
