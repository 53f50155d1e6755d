//! Exact linear-scan search over a [`VectorStore`].

use std::sync::Arc;

use crate::error::Result;
use crate::vector::{DistanceMeasure, VectorStore};
use crate::vector_search::batch::{BatchOptions, BatchResults, run_batch};
use crate::vector_search::collector::TopKCollector;
use crate::vector_search::result::SearchResult;

/// Exact top-k search: scores every candidate in the store.
///
/// Serves as the correctness oracle for the approximate index and as the
/// fallback for small corpora.
#[derive(Debug, Clone)]
pub struct BruteForceSearcher {
    store: Arc<VectorStore>,
    measure: DistanceMeasure,
}

impl BruteForceSearcher {
    /// Create a brute-force searcher over `store`.
    pub fn new(store: Arc<VectorStore>, measure: DistanceMeasure) -> Self {
        Self { store, measure }
    }

    /// The searched store.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// The configured distance measure.
    pub fn measure(&self) -> DistanceMeasure {
        self.measure
    }

    /// Return the `k` best candidates for `query`.
    ///
    /// `k == 0` yields an empty result; `k` larger than the store ranks
    /// every candidate.
    pub fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        self.store.validate_query(query)?;
        if k == 0 {
            return Ok(SearchResult::empty());
        }

        let mut collector = TopKCollector::new(k.min(self.store.len()));
        for position in 0..self.store.len() {
            let distance = self.measure.distance(query, self.store.vector(position));
            collector.collect(distance, self.store.id(position), position);
        }

        let examined = collector.total_seen();
        Ok(SearchResult::from_ranked(
            collector.into_sorted(),
            self.measure,
            examined,
        ))
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
