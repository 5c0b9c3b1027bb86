//! Link-based deduplication across sources.
use crate::feed::RawEntry;
use std::collections::HashSet;

/// A [`RawEntry`] that survived deduplication.
pub type UniqueEntry = RawEntry;

/// Flattens per-source entry lists and removes duplicate links.
///
/// Entries are visited in source order, then in feed order. Entries with an
/// empty link are dropped. The first entry seen for a link is kept and later
/// ones are discarded, whatever their content. Survivors keep their relative
/// order.
pub fn merge_entries(batches: Vec<Vec<RawEntry>>) -> Vec<UniqueEntry> {
    let raw_count: usize = batches.iter().map(Vec::len).sum();
    let mut seen_links: HashSet<String> = HashSet::with_capacity(raw_count);

    let unique: Vec<UniqueEntry> = batches
        .into_iter()
        .flatten()
        .filter(|entry| !entry.link.is_empty() && seen_links.insert(entry.link.clone()))
        .collect();

    tracing::info!(
        raw = raw_count,
        unique = unique.len(),
        "Merged entries"
    );
    unique
}
