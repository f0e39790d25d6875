//! Implication resolver.
//!
//! Expands a raw detection set to closure over the store's "implies" edges:
//! detecting WordPress entails PHP and MySQL even when neither left direct
//! evidence on the page. Resolution is a fixed-point iteration over an
//! explicit accumulator keyed by unique technology name; no recursion, so
//! cyclic or deep implication chains cannot grow the stack, and a name
//! already present is never re-added, which guarantees termination.

use std::collections::HashSet;

use crate::fingerprint::matching::{Detection, EvidenceSource};
use crate::fingerprint::store::FingerprintStore;

/// Extends `detections` with all transitively implied technologies.
///
/// Implied detections carry confidence 1.0, source `implied`, and their own
/// rule's category. An implied name with no rule in the store is ignored.
/// Running the resolver on an already-resolved set is a no-op.
pub fn resolve_implications(detections: &mut Vec<Detection>, store: &FingerprintStore) {
    let mut present: HashSet<String> = detections
        .iter()
        .map(|d| d.technology.clone())
        .collect();

    loop {
        let mut added = false;

        // Scan a stable prefix; anything appended this round is scanned on
        // the next pass until a full scan adds nothing new
        let scan_len = detections.len();
        for i in 0..scan_len {
            let implied_names = match store.rule(&detections[i].technology) {
                Some(rule) => rule.implies.clone(),
                None => continue,
            };
            for implied in implied_names {
                if present.contains(&implied) {
                    continue;
                }
                let Some(rule) = store.rule(&implied) else {
                    log::debug!("Ignoring implied technology '{}' with no store rule", implied);
                    continue;
                };
                detections.push(Detection {
                    technology: implied.clone(),
                    category: store.primary_category(rule),
                    confidence: 1.0,
                    source: EvidenceSource::Implied,
                });
                present.insert(implied);
                added = true;
            }
        }

        if !added {
            break;
        }
    }
}
