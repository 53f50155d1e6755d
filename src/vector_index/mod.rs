//! Index construction: partitioning, quantization, and the built index.
//!
//! - `kmeans`: seeded Lloyd's k-means shared by both training stages
//! - `partitioner`: splits the store into leaves
//! - `quantizer`: block-wise product quantization and lookup tables
//! - `builder`: fluent construction of an [`Index`]
//! - `registry`: named indexes with build reservations

pub mod builder;
pub mod config;
pub mod index;
pub mod kmeans;
pub mod partitioner;
pub mod quantizer;
pub mod registry;

pub use builder::{IndexBuilder, create_builder};
pub use config::{IndexConfig, PartitioningConfig, QuantizationConfig, ReorderingConfig};
pub use index::{Index, IndexStats, ReorderBuffer};
pub use kmeans::Initialization;
pub use partitioner::{Leaf, PartitionTable, Partitioner};
pub use quantizer::{Codebook, EncodedVector, EncodedVectors, LookupTable, Quantizer};
pub use registry::{IndexRegistry, IndexState, Reservation};
