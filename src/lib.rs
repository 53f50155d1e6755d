//! # Vantage
//!
//! Approximate top-k vector retrieval over a fixed in-memory database.
//!
//! ## Features
//!
//! - Exact brute-force search as a correctness baseline
//! - k-means partitioning into leaves, searched by nearest centroids
//! - Block-wise product quantization with lookup-table scoring
//! - Optional exact re-ranking of the best approximate candidates
//! - Parallel builds and batched queries on rayon
//! - Dot product, cosine, and squared L2 measures
//!
//! ## Example
//!
//! ```
//! use vantage::{DistanceMeasure, create_builder};
//!
//! let database = vec![
//!     (1, vec![0.0, 0.0]),
//!     (2, vec![0.2, 0.1]),
//!     (3, vec![0.1, 0.3]),
//!     (4, vec![10.0, 10.0]),
//!     (5, vec![10.2, 9.9]),
//!     (6, vec![9.8, 10.1]),
//! ];
//! let index = create_builder(database, 2, DistanceMeasure::SquaredL2)?
//!     .with_partitioning(2, 1, 10, 7)
//!     .build("demo")?;
//!
//! let result = index.search(&[0.1, 0.1], 2)?;
//! assert_eq!(result.ids(), vec![2, 1]);
//! # Ok::<(), vantage::VantageError>(())
//! ```

pub mod error;
pub mod util;
pub mod vector;
pub mod vector_index;
pub mod vector_search;

pub use error::{Result, VantageError};
pub use vector::{Candidate, DistanceMeasure, VectorStore};
pub use vector_index::{
    Index, IndexBuilder, IndexConfig, IndexRegistry, IndexStats, create_builder,
};
pub use vector_search::{
    BatchOptions, BruteForceSearcher, SearchHit, SearchParams, SearchResult, Searcher,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
