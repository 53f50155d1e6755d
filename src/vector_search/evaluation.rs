//! Recall measurement against exact results.

use ahash::AHashSet;

use crate::vector_search::result::SearchResult;

/// Fraction of `exact` hits that also appear in `approximate`.
///
/// An empty `exact` result counts as full recall.
pub fn recall_at_k(approximate: &SearchResult, exact: &SearchResult) -> f32 {
    if exact.is_empty() {
        return 1.0;
    }
    let found: AHashSet<u64> = approximate.hits.iter().map(|hit| hit.id).collect();
    let matched = exact
        .hits
        .iter()
        .filter(|hit| found.contains(&hit.id))
        .count();
    matched as f32 / exact.len() as f32
}

/// Mean of [`recall_at_k`] over paired results.
///
/// Pairs are zipped, so extra entries on either side are ignored. No
/// pairs yields zero.
pub fn mean_recall_at_k(approximate: &[SearchResult], exact: &[SearchResult]) -> f32 {
    let recalls: Vec<f32> = approximate
        .iter()
        .zip(exact)
        .map(|(approximate, exact)| recall_at_k(approximate, exact))
        .collect();
    if recalls.is_empty() {
        return 0.0;
    }
    recalls.iter().sum::<f32>() / recalls.len() as f32
}
