//! Vector primitives: the candidate store and the distance measures.

pub mod distance;
pub mod store;

pub use distance::DistanceMeasure;
pub use store::{Candidate, VectorStore};
