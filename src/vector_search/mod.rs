//! Query execution: exact scans, approximate index search, and batching.

pub mod batch;
pub mod brute_force;
pub(crate) mod collector;
pub mod evaluation;
pub mod result;
pub mod searcher;

pub use batch::{BatchOptions, BatchResults};
pub use brute_force::BruteForceSearcher;
pub use evaluation::{mean_recall_at_k, recall_at_k};
pub use result::{SearchHit, SearchResult};
pub use searcher::{SearchParams, Searcher};
