//! The built, immutable index.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::vector::{DistanceMeasure, VectorStore};
use crate::vector_index::config::IndexConfig;
use crate::vector_index::partitioner::PartitionTable;
use crate::vector_index::quantizer::{Codebook, EncodedVectors};
use crate::vector_search::batch::{BatchOptions, BatchResults};
use crate::vector_search::result::SearchResult;
use crate::vector_search::searcher::{SearchParams, Searcher};

/// Full-precision vectors consulted by the reorder pass.
#[derive(Debug, Clone)]
pub struct ReorderBuffer {
    store: Arc<VectorStore>,
    num_reordering_candidates: usize,
}

impl ReorderBuffer {
    /// Create a reorder buffer sharing `store`.
    pub fn new(store: Arc<VectorStore>, num_reordering_candidates: usize) -> Self {
        Self {
            store,
            num_reordering_candidates,
        }
    }

    /// Default number of candidates re-ranked per query.
    pub fn num_reordering_candidates(&self) -> usize {
        self.num_reordering_candidates
    }

    /// Exact distance from `query` to the candidate at `position`.
    pub fn exact_distance(&self, measure: DistanceMeasure, query: &[f32], position: usize) -> f32 {
        measure.distance(query, self.store.vector(position))
    }
}

/// How candidates inside a leaf are scored.
#[derive(Debug, Clone)]
pub(crate) enum LeafScoring {
    /// Full-precision distances against the store.
    Exact,
    /// Lookup-table distances against encoded vectors.
    Quantized {
        codebook: Codebook,
        codes: EncodedVectors,
    },
}

/// A built index. Immutable and safe to share across threads.
#[derive(Debug)]
pub struct Index {
    pub(crate) name: String,
    pub(crate) build_id: Uuid,
    pub(crate) config: IndexConfig,
    pub(crate) store: Arc<VectorStore>,
    pub(crate) partitions: PartitionTable,
    pub(crate) scoring: LeafScoring,
    pub(crate) reorder: Option<ReorderBuffer>,
    pub(crate) built_at: DateTime<Utc>,
}

impl Index {
    /// The identifier this index was built under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique id of this build.
    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    /// The configuration used to build this index.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Distance measure for partitioning and scoring.
    pub fn measure(&self) -> DistanceMeasure {
        self.config.distance_measure
    }

    /// Default number of hits per query.
    pub fn num_neighbors(&self) -> usize {
        self.config.num_neighbors
    }

    /// Vector width.
    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// Number of indexed candidates.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the index holds no candidates.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// The source store.
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// The leaves of this index.
    pub fn partitions(&self) -> &PartitionTable {
        &self.partitions
    }

    /// The trained codebook, if the index is quantized.
    pub fn codebook(&self) -> Option<&Codebook> {
        match &self.scoring {
            LeafScoring::Quantized { codebook, .. } => Some(codebook),
            LeafScoring::Exact => None,
        }
    }

    /// Encoded vectors, if the index is quantized.
    pub fn encoded_vectors(&self) -> Option<&EncodedVectors> {
        match &self.scoring {
            LeafScoring::Quantized { codes, .. } => Some(codes),
            LeafScoring::Exact => None,
        }
    }

    /// The reorder buffer, if reordering is enabled.
    pub fn reorder_buffer(&self) -> Option<&ReorderBuffer> {
        self.reorder.as_ref()
    }

    /// When the build finished.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Return the `k` best candidates for `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        Searcher::new(self).search(query, k)
    }

    /// Search with per-query overrides.
    pub fn search_with(&self, query: &[f32], params: &SearchParams) -> Result<SearchResult> {
        Searcher::new(self).search_with(query, params)
    }

    /// Search many queries; entry `i` answers `queries[i]`.
    pub fn search_batched<Q>(&self, queries: &[Q], k: usize, parallel: bool) -> Result<BatchResults>
    where
        Q: AsRef<[f32]> + Sync,
    {
        Searcher::new(self).search_batched(queries, k, parallel)
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
        Searcher::new(self).search_batched_with(queries, k, options)
    }

    /// Summary statistics about this index.
    pub fn stats(&self) -> IndexStats {
        let sizes: Vec<usize> = self
            .partitions
            .leaves()
            .iter()
            .map(|leaf| leaf.len())
            .collect();
        let num_leaves = sizes.len();

        let (num_blocks, codebook_size, bytes_per_encoded_vector) = match &self.scoring {
            LeafScoring::Quantized { codebook, codes } => (
                codebook.num_blocks(),
                codebook.codebook_size(),
                codes.bytes_per_vector(),
            ),
            LeafScoring::Exact => (0, 0, 0),
        };

        IndexStats {
            name: self.name.clone(),
            build_id: self.build_id,
            num_candidates: self.store.len(),
            dimension: self.store.dimension(),
            distance_measure: self.measure(),
            num_leaves,
            min_leaf_size: sizes.iter().copied().min().unwrap_or(0),
            max_leaf_size: sizes.iter().copied().max().unwrap_or(0),
            mean_leaf_size: if num_leaves == 0 {
                0.0
            } else {
                self.store.len() as f64 / num_leaves as f64
            },
            empty_leaves: sizes.iter().filter(|size| **size == 0).count(),
            num_blocks,
            codebook_size,
            bytes_per_encoded_vector,
            reordering: self.reorder.is_some(),
            built_at: self.built_at,
        }
    }
}

/// Summary statistics of a built index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub name: String,
    pub build_id: Uuid,
    pub num_candidates: usize,
    pub dimension: usize,
    pub distance_measure: DistanceMeasure,
    pub num_leaves: usize,
    pub min_leaf_size: usize,
    pub max_leaf_size: usize,
    pub mean_leaf_size: f64,
    pub empty_leaves: usize,
    /// Zero for unquantized indexes.
    pub num_blocks: usize,
    pub codebook_size: usize,
    pub bytes_per_encoded_vector: usize,
    pub reordering: bool,
    pub built_at: DateTime<Utc>,
}

impl IndexStats {
    /// Render as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
