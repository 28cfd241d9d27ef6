//! Deterministic result ordering.
//!
//! Both vector collections rank candidates the same way: descending
//! similarity, truncated to a limit. Candidates are handed in ingestion
//! order and the sort is stable, so equal similarities preserve original
//! ingestion order — ranking is fully deterministic for a given store
//! state.

use std::cmp::Ordering;

/// Sort `items` by descending similarity and truncate to `limit`.
///
/// `items` must be in ingestion order; the stable sort keeps that order
/// for ties. NaN similarities (which a well-behaved embedder never
/// produces) compare as equal and therefore also fall back to ingestion
/// order.
pub fn top_k_by_similarity<T, F>(mut items: Vec<T>, limit: usize, similarity: F) -> Vec<T>
where
    F: Fn(&T) -> f32,
{
    items.sort_by(|a, b| {
        similarity(b)
            .partial_cmp(&similarity(a))
            .unwrap_or(Ordering::Equal)
    });
    items.truncate(limit);
    items
}
