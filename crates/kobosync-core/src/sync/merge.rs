//! Deduplicating merge
//!
//! Combines the highlights already in a book's document with newly fetched
//! ones. Identity is (text, note, timestamp), so re-fetching a highlight
//! after a run that wrote it but never stored its cursor adds nothing.

use std::collections::HashSet;

use crate::models::Highlight;

/// `existing` in order, then every unseen `incoming` highlight in order
///
/// The key set is cumulative, so duplicates inside `incoming` collapse to
/// their first occurrence. `merge(merge(a, b), b) == merge(a, b)`.
pub fn merge(existing: &[Highlight], incoming: &[Highlight]) -> Vec<Highlight> {
    let mut merged = existing.to_vec();
    merged.extend(new_entries(existing, incoming));
    merged
}

/// The tail `merge` appends to `existing`
pub fn new_entries(existing: &[Highlight], incoming: &[Highlight]) -> Vec<Highlight> {
    let mut seen: HashSet<String> = existing.iter().map(Highlight::identity_key).collect();

    incoming
        .iter()
        .filter(|h| seen.insert(h.identity_key()))
        .cloned()
        .collect()
}
