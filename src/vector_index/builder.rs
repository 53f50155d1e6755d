//! Fluent construction of partitioned, quantized indexes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info};
use uuid::Uuid;

use crate::error::{Result, VantageError};
use crate::util::deadline::{Deadline, check_deadline};
use crate::vector::{DistanceMeasure, VectorStore};
use crate::vector_index::config::{
    IndexConfig, PartitioningConfig, QuantizationConfig, ReorderingConfig,
};
use crate::vector_index::index::{Index, LeafScoring, ReorderBuffer};
use crate::vector_index::partitioner::{PartitionTable, Partitioner};
use crate::vector_index::quantizer::Quantizer;

/// Start building an index over `database`.
///
/// Fails if the database is empty, has mixed dimensions, non-finite
/// values, or duplicate ids.
///
/// ```
/// use vantage::{DistanceMeasure, create_builder};
///
/// let database = (0..100u64)
///     .map(|i| (i, vec![(i % 10) as f32, (i / 10) as f32]))
///     .collect();
/// let index = create_builder(database, 5, DistanceMeasure::SquaredL2)?
///     .with_partitioning(10, 3, 8, 7)
///     .with_quantization(1)
///     .with_reordering(20)
///     .build("grid")?;
///
/// let result = index.search(&[4.0, 4.0], 5)?;
/// assert_eq!(result.hits[0].id, 44);
/// # Ok::<(), vantage::VantageError>(())
/// ```
pub fn create_builder(
    database: Vec<(u64, Vec<f32>)>,
    num_neighbors: usize,
    measure: DistanceMeasure,
) -> Result<IndexBuilder> {
    let store = VectorStore::new(database)?;
    Ok(IndexBuilder::new(Arc::new(store), num_neighbors, measure))
}

/// Accumulates configuration, then builds an [`Index`].
///
/// The builder can be reused; every call to [`IndexBuilder::build`]
/// produces an independent index with its own build id.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    store: Arc<VectorStore>,
    config: IndexConfig,
    timeout: Option<Duration>,
}

impl IndexBuilder {
    /// Create a builder with no optional stages.
    pub fn new(store: Arc<VectorStore>, num_neighbors: usize, measure: DistanceMeasure) -> Self {
        Self::from_config(store, IndexConfig::new(num_neighbors, measure))
    }

    /// Create a builder from a full configuration.
    pub fn from_config(store: Arc<VectorStore>, config: IndexConfig) -> Self {
        Self {
            store,
            config,
            timeout: None,
        }
    }

    /// Enable k-means partitioning.
    pub fn with_partitioning(
        mut self,
        num_leaves: usize,
        num_leaves_to_search: usize,
        training_iterations: usize,
        seed: u64,
    ) -> Self {
        let initialization = self
            .config
            .partitioning
            .as_ref()
            .map(|p| p.initialization)
            .unwrap_or_default();
        self.config.partitioning = Some(PartitioningConfig {
            num_leaves,
            num_leaves_to_search,
            training_iterations,
            seed,
            initialization,
        });
        self
    }

    /// Enable partitioning with a full configuration.
    pub fn with_partitioning_config(mut self, partitioning: PartitioningConfig) -> Self {
        self.config.partitioning = Some(partitioning);
        self
    }

    /// Enable block-wise quantization with `dimensions_per_block`.
    pub fn with_quantization(mut self, dimensions_per_block: usize) -> Self {
        let base = self.config.quantization.take().unwrap_or_default();
        self.config.quantization = Some(QuantizationConfig {
            dimensions_per_block,
            ..base
        });
        self
    }

    /// Enable quantization with a full configuration.
    pub fn with_quantization_config(mut self, quantization: QuantizationConfig) -> Self {
        self.config.quantization = Some(quantization);
        self
    }

    /// Re-rank the best `num_reordering_candidates` exactly.
    pub fn with_reordering(mut self, num_reordering_candidates: usize) -> Self {
        self.config.reordering = Some(ReorderingConfig {
            num_reordering_candidates,
        });
        self
    }

    /// Run the build on the rayon pool or sequentially.
    pub fn with_parallel_build(mut self, parallel: bool) -> Self {
        self.config.parallel_build = parallel;
        self
    }

    /// Fail a build with a timeout once it runs longer than `timeout`.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The accumulated configuration.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The source store.
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Build under a generated v4 UUID name.
    pub fn build_with_generated_name(&self) -> Result<Arc<Index>> {
        self.build(Uuid::new_v4().to_string())
    }

    /// Partition, train, and encode the store.
    pub fn build(&self, identifier: impl Into<String>) -> Result<Arc<Index>> {
        let name = identifier.into();
        if name.is_empty() {
            return Err(VantageError::invalid_parameter(
                "index identifier must not be empty",
            ));
        }
        self.config.validate(self.store.len(), self.store.dimension())?;

        let started = Instant::now();
        let deadline = self.timeout.map(Deadline::after);
        let parallel = self.config.parallel_build;
        let measure = self.config.distance_measure;

        info!(
            "Building index {name}: {} vectors of dimension {}, measure {measure}",
            self.store.len(),
            self.store.dimension()
        );

        // Cosine geometry is trained on unit vectors.
        let working = if measure == DistanceMeasure::Cosine {
            Arc::new(self.store.normalized(parallel))
        } else {
            Arc::clone(&self.store)
        };

        let partitions = match &self.config.partitioning {
            Some(partitioning) => Partitioner::new(measure)
                .with_initialization(partitioning.initialization)
                .with_parallel(parallel)
                .with_deadline(deadline)
                .partition(
                    &working,
                    partitioning.num_leaves,
                    partitioning.training_iterations,
                    partitioning.seed,
                )?,
            None => PartitionTable::single_leaf(&working, measure),
        };
        check_deadline(deadline.as_ref(), "index build")?;
        debug!("Index {name}: {} leaves", partitions.len());

        let scoring = match &self.config.quantization {
            Some(quantization) => {
                let codebook = Quantizer::new(quantization.dimensions_per_block)?
                    .with_codebook_size(quantization.codebook_size)?
                    .with_training_iterations(quantization.training_iterations)
                    .with_training_sample_size(quantization.training_sample_size)
                    .with_seed(quantization.seed)
                    .with_parallel(parallel)
                    .with_deadline(deadline)
                    .train(&working)?;
                let codes = codebook.encode_store(&working, parallel)?;
                debug!(
                    "Index {name}: encoded {} vectors into {} bytes each",
                    codes.len(),
                    codes.bytes_per_vector()
                );
                LeafScoring::Quantized { codebook, codes }
            }
            None => LeafScoring::Exact,
        };
        check_deadline(deadline.as_ref(), "index build")?;

        let reorder = self.config.reordering.as_ref().map(|reordering| {
            ReorderBuffer::new(
                Arc::clone(&self.store),
                reordering.num_reordering_candidates,
            )
        });

        let index = Index {
            name,
            build_id: Uuid::new_v4(),
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            partitions,
            scoring,
            reorder,
            built_at: Utc::now(),
        };

        info!(
            "Built index {} ({}) in {:?}",
            index.name,
            index.build_id,
            started.elapsed()
        );

        Ok(Arc::new(index))
    }
}
