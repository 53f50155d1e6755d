//! Approximate top-k search over a built [`Index`].
//!
//! A query runs in three stages:
//!
//! 1. pick the `num_leaves_to_search` leaves whose centroids are nearest,
//! 2. score every member of those leaves, through the codebook lookup
//!    table when the index is quantized and exactly otherwise,
//! 3. optionally re-rank the best approximate candidates with exact
//!    distances and keep the top `k`.

use log::debug;

use crate::error::{Result, VantageError};
use crate::vector_index::index::{Index, LeafScoring};
use crate::vector_search::batch::{BatchOptions, BatchResults, run_batch};
use crate::vector_search::collector::TopKCollector;
use crate::vector_search::result::SearchResult;

/// Per-query overrides of the index defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// Hits to return; defaults to the index's `num_neighbors`.
    pub k: Option<usize>,
    /// Leaves to scan; defaults to the index configuration.
    pub num_leaves_to_search: Option<usize>,
    /// Candidates to re-rank; ignored when the index has no reorder buffer.
    pub num_reordering_candidates: Option<usize>,
}

impl SearchParams {
    /// Parameters returning `k` hits.
    pub fn new(k: usize) -> Self {
        Self {
            k: Some(k),
            ..Default::default()
        }
    }

    /// Override the number of leaves scanned.
    pub fn with_num_leaves_to_search(mut self, num_leaves_to_search: usize) -> Self {
        self.num_leaves_to_search = Some(num_leaves_to_search);
        self
    }

    /// Override the number of re-ranked candidates.
    pub fn with_num_reordering_candidates(mut self, num_reordering_candidates: usize) -> Self {
        self.num_reordering_candidates = Some(num_reordering_candidates);
        self
    }
}

/// Runs queries against one index.
#[derive(Debug, Clone, Copy)]
pub struct Searcher<'a> {
    index: &'a Index,
}

impl<'a> Searcher<'a> {
    /// Create a searcher over `index`.
    pub fn new(index: &'a Index) -> Self {
        Self { index }
    }

    /// Return the `k` best candidates for `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        self.search_with(query, &SearchParams::new(k))
    }

    /// Search with per-query overrides.
    pub fn search_with(&self, query: &[f32], params: &SearchParams) -> Result<SearchResult> {
        let index = self.index;
        let store = &index.store;
        let measure = index.measure();

        store.validate_query(query)?;

        let k = params.k.unwrap_or(index.num_neighbors());
        if k == 0 {
            return Ok(SearchResult::empty());
        }

        let requested = params
            .num_leaves_to_search
            .unwrap_or(index.config.num_leaves_to_search());
        if requested == 0 {
            return Err(VantageError::invalid_parameter(
                "num_leaves_to_search must be positive",
            ));
        }
        let num_leaves = index.partitions.len();
        if requested > num_leaves {
            debug!(
                "Clamping num_leaves_to_search from {requested} to {num_leaves} for index {}",
                index.name
            );
        }

        let reorder = match &index.reorder {
            Some(buffer) => {
                let count = params
                    .num_reordering_candidates
                    .unwrap_or(buffer.num_reordering_candidates());
                if count == 0 {
                    return Err(VantageError::invalid_parameter(
                        "num_reordering_candidates must be positive",
                    ));
                }
                Some((buffer, count))
            }
            None => None,
        };

        let capacity = match reorder {
            Some((_, count)) => k.max(count),
            None => k,
        };
        let mut collector = TopKCollector::new(capacity);
        let leaves = index.partitions.leaves();
        let selected = index.partitions.nearest_leaves(query, requested);

        match &index.scoring {
            LeafScoring::Quantized { codebook, codes } => {
                let table = codebook.lookup_table(query, measure)?;
                for leaf in selected {
                    for &position in leaves[leaf].positions() {
                        let distance = table.distance(codes.get(position));
                        collector.collect(distance, store.id(position), position);
                    }
                }
            }
            LeafScoring::Exact => {
                for leaf in selected {
                    for &position in leaves[leaf].positions() {
                        let distance = measure.distance(query, store.vector(position));
                        collector.collect(distance, store.id(position), position);
                    }
                }
            }
        }

        let examined = collector.total_seen();
        let mut ranked = collector.into_sorted();

        if let Some((buffer, _)) = reorder {
            for candidate in ranked.iter_mut() {
                candidate.distance = buffer.exact_distance(measure, query, candidate.position);
            }
            ranked.sort_unstable();
        }
        ranked.truncate(k);

        Ok(SearchResult::from_ranked(ranked, measure, examined))
    }

    /// Search many queries; entry `i` answers `queries[i]`.
    pub fn search_batched<Q>(&self, queries: &[Q], k: usize, parallel: bool) -> Result<BatchResults>
    where
        Q: AsRef<[f32]> + Sync,
    {
        self.search_batched_with(queries, k, &BatchOptions::new().with_parallel(parallel))
    }

    /// Search many queries with explicit batch options.
    pub fn search_batched_with<Q>(
        &self,
        queries: &[Q],
        k: usize,
        options: &BatchOptions,
    ) -> Result<BatchResults>
    where
        Q: AsRef<[f32]> + Sync,
    {
        run_batch(queries, options, |query| self.search(query, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::DistanceMeasure;
    use crate::vector_index::builder::create_builder;

    fn two_clusters() -> Vec<(u64, Vec<f32>)> {
        vec![
            (1, vec![1.0, 0.0]),
            (2, vec![0.9, 0.1]),
            (3, vec![0.0, 1.0]),
            (4, vec![0.1, 0.9]),
            (5, vec![1.0, 1.0]),
            (6, vec![0.95, 0.05]),
        ]
    }

    #[test]
    fn test_exact_single_leaf_finds_nearest() {
        let index = create_builder(two_clusters(), 2, DistanceMeasure::SquaredL2)
            .unwrap()
            .build("exact")
            .unwrap();

        let result = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(result.ids(), vec![1, 6]);
        assert_eq!(result.candidates_examined, 6);
    }

    #[test]
    fn test_default_k_from_params() {
        let index = create_builder(two_clusters(), 3, DistanceMeasure::SquaredL2)
            .unwrap()
            .build("defaults")
            .unwrap();

        let result = index.search_with(&[0.0, 1.0], &SearchParams::default()).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.hits[0].id, 3);
    }

    #[test]
    fn test_zero_leaves_override_rejected() {
        let index = create_builder(two_clusters(), 2, DistanceMeasure::SquaredL2)
            .unwrap()
            .build("zero")
            .unwrap();

        let params = SearchParams::new(2).with_num_leaves_to_search(0);
        assert!(matches!(
            index.search_with(&[0.0, 1.0], &params),
            Err(VantageError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_reorder_override_ignored_without_buffer() {
        let index = create_builder(two_clusters(), 2, DistanceMeasure::SquaredL2)
            .unwrap()
            .build("no-reorder")
            .unwrap();

        let params = SearchParams::new(2).with_num_reordering_candidates(0);
        assert!(index.search_with(&[0.0, 1.0], &params).is_ok());
    }

    #[test]
    fn test_reorder_restores_exact_scores() {
        let index = create_builder(two_clusters(), 2, DistanceMeasure::SquaredL2)
            .unwrap()
            .with_quantization(1)
            .with_quantization_config(crate::vector_index::config::QuantizationConfig {
                dimensions_per_block: 1,
                codebook_size: 2,
                ..Default::default()
            })
            .with_reordering(6)
            .build("reorder")
            .unwrap();

        let result = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(result.ids(), vec![1, 6]);
        assert_eq!(result.hits[0].score, 0.0);
        assert!((result.hits[1].score - 0.005).abs() < 1e-6);
    }
}
