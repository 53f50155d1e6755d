//! Build configuration for partitioned, quantized indexes.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VantageError};
use crate::vector::DistanceMeasure;
use crate::vector_index::kmeans::Initialization;
use crate::vector_index::quantizer::{DEFAULT_CODEBOOK_ITERATIONS, MAX_CODEBOOK_SIZE};

/// Top-level index configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Default number of hits returned per query.
    pub num_neighbors: usize,

    /// Distance measure used for both partitioning and scoring.
    pub distance_measure: DistanceMeasure,

    /// Partitioning stage. `None` keeps every candidate in one leaf.
    pub partitioning: Option<PartitioningConfig>,

    /// Quantization stage. `None` scores leaves at full precision.
    pub quantization: Option<QuantizationConfig>,

    /// Exact re-ranking stage. `None` skips it.
    pub reordering: Option<ReorderingConfig>,

    /// Use the rayon pool during the build.
    pub parallel_build: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            num_neighbors: 10,
            distance_measure: DistanceMeasure::default(),
            partitioning: None,
            quantization: None,
            reordering: None,
            parallel_build: true,
        }
    }
}

/// Partitioning (k-means over the whole vectors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitioningConfig {
    /// Number of leaves to build.
    pub num_leaves: usize,

    /// Leaves scanned per query.
    pub num_leaves_to_search: usize,

    /// Fixed number of k-means passes.
    pub training_iterations: usize,

    /// Seed for centroid initialization.
    pub seed: u64,

    /// Centroid initialization strategy.
    pub initialization: Initialization,
}

impl Default for PartitioningConfig {
    fn default() -> Self {
        Self {
            num_leaves: 100,
            num_leaves_to_search: 10,
            training_iterations: 12,
            seed: 42,
            initialization: Initialization::default(),
        }
    }
}

/// Block-wise product quantization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationConfig {
    /// Width of each block; the last block may be shorter.
    pub dimensions_per_block: usize,

    /// Codewords per block (1..=256).
    pub codebook_size: usize,

    /// k-means passes per block codebook.
    pub training_iterations: usize,

    /// Train on a seeded subset of this many candidates.
    pub training_sample_size: Option<usize>,

    /// Base seed for codebook training.
    pub seed: u64,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            dimensions_per_block: 2,
            codebook_size: MAX_CODEBOOK_SIZE,
            training_iterations: DEFAULT_CODEBOOK_ITERATIONS,
            training_sample_size: None,
            seed: 42,
        }
    }
}

impl QuantizationConfig {
    /// Default quantization with the given block width.
    pub fn new(dimensions_per_block: usize) -> Self {
        Self {
            dimensions_per_block,
            ..Default::default()
        }
    }
}

/// Exact re-ranking of the best approximate candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderingConfig {
    /// Candidates kept for exact re-ranking.
    pub num_reordering_candidates: usize,
}

impl Default for ReorderingConfig {
    fn default() -> Self {
        Self {
            num_reordering_candidates: 100,
        }
    }
}

impl IndexConfig {
    /// Create a configuration with no optional stages.
    pub fn new(num_neighbors: usize, distance_measure: DistanceMeasure) -> Self {
        Self {
            num_neighbors,
            distance_measure,
            ..Default::default()
        }
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration to pretty JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Number of leaves the index will have.
    pub fn num_leaves(&self) -> usize {
        self.partitioning.as_ref().map_or(1, |p| p.num_leaves)
    }

    /// Default number of leaves scanned per query.
    pub fn num_leaves_to_search(&self) -> usize {
        self.partitioning.as_ref().map_or(1, |p| p.num_leaves_to_search)
    }

    /// Check the configuration against a store of `num_candidates`
    /// vectors of width `dimension`.
    pub fn validate(&self, num_candidates: usize, dimension: usize) -> Result<()> {
        if self.num_neighbors == 0 {
            return Err(VantageError::invalid_parameter(
                "num_neighbors must be positive",
            ));
        }

        if let Some(partitioning) = &self.partitioning {
            if partitioning.num_leaves == 0 {
                return Err(VantageError::invalid_parameter(
                    "num_leaves must be positive",
                ));
            }
            if partitioning.num_leaves > num_candidates {
                return Err(VantageError::invalid_parameter(format!(
                    "num_leaves ({}) exceeds the number of candidates ({num_candidates})",
                    partitioning.num_leaves
                )));
            }
            if partitioning.num_leaves_to_search == 0 {
                return Err(VantageError::invalid_parameter(
                    "num_leaves_to_search must be positive",
                ));
            }
        }

        if let Some(quantization) = &self.quantization {
            if quantization.dimensions_per_block == 0 {
                return Err(VantageError::invalid_parameter(
                    "dimensions_per_block must be positive",
                ));
            }
            if quantization.dimensions_per_block > dimension {
                return Err(VantageError::invalid_parameter(format!(
                    "dimensions_per_block ({}) exceeds the vector dimension ({dimension})",
                    quantization.dimensions_per_block
                )));
            }
            if quantization.codebook_size == 0 || quantization.codebook_size > MAX_CODEBOOK_SIZE
            {
                return Err(VantageError::invalid_parameter(format!(
                    "codebook_size must be in 1..={MAX_CODEBOOK_SIZE}, got {}",
                    quantization.codebook_size
                )));
            }
        }

        if let Some(reordering) = &self.reordering
            && reordering.num_reordering_candidates == 0
        {
            return Err(VantageError::invalid_parameter(
                "num_reordering_candidates must be positive",
            ));
        }

        Ok(())
    }
}
