//! Immutable storage for the candidate database.

use ahash::AHashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VantageError};
use crate::vector::distance::normalize_in_place;

/// A single database entry: an id and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Caller-assigned identifier, unique within a store.
    pub id: u64,
    /// The embedding values.
    pub vector: Vec<f32>,
}

impl Candidate {
    /// Create a new candidate.
    pub fn new(id: u64, vector: Vec<f32>) -> Self {
        Self { id, vector }
    }
}

impl From<(u64, Vec<f32>)> for Candidate {
    fn from((id, vector): (u64, Vec<f32>)) -> Self {
        Self { id, vector }
    }
}

/// An ordered, immutable collection of candidates sharing one dimension.
///
/// Vectors are kept in a single row-major buffer; position `i` holds the
/// `i`-th candidate in insertion order. Positions are not semantically
/// meaningful outside the crate, ids are.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    ids: Vec<u64>,
    data: Vec<f32>,
    positions: AHashMap<u64, usize>,
}

impl VectorStore {
    /// Build a store from `(id, vector)` pairs.
    pub fn new(candidates: Vec<(u64, Vec<f32>)>) -> Result<Self> {
        Self::from_candidates(candidates.into_iter().map(Candidate::from).collect())
    }

    /// Build a store from candidates, validating every vector.
    pub fn from_candidates(candidates: Vec<Candidate>) -> Result<Self> {
        let first = candidates.first().ok_or_else(|| {
            VantageError::invalid_parameter("Cannot build a vector store from an empty database")
        })?;

        let dimension = first.vector.len();
        if dimension == 0 {
            return Err(VantageError::invalid_parameter(
                "Vectors must have at least one dimension",
            ));
        }

        let mut ids = Vec::with_capacity(candidates.len());
        let mut data = Vec::with_capacity(candidates.len() * dimension);
        let mut positions = AHashMap::with_capacity(candidates.len());

        for (position, candidate) in candidates.into_iter().enumerate() {
            if candidate.vector.len() != dimension {
                return Err(VantageError::dimension_mismatch(
                    dimension,
                    candidate.vector.len(),
                ));
            }

            if !candidate.vector.iter().all(|x| x.is_finite()) {
                return Err(VantageError::invalid_parameter(format!(
                    "Vector {} contains invalid values (NaN or infinity)",
                    candidate.id
                )));
            }

            if positions.insert(candidate.id, position).is_some() {
                return Err(VantageError::invalid_parameter(format!(
                    "Duplicate candidate id {}",
                    candidate.id
                )));
            }

            ids.push(candidate.id);
            data.extend_from_slice(&candidate.vector);
        }

        Ok(Self {
            dimension,
            ids,
            data,
            positions,
        })
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the store holds no candidates. Always false for a validated store.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Dimension shared by every vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Id of the candidate at `position`.
    #[inline]
    pub fn id(&self, position: usize) -> u64 {
        self.ids[position]
    }

    /// Vector of the candidate at `position`.
    #[inline]
    pub fn vector(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// All ids in store order.
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// The raw row-major vector buffer.
    pub fn rows(&self) -> &[f32] {
        &self.data
    }

    /// Position of a candidate by id.
    pub fn position(&self, id: u64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Look up a vector by candidate id.
    pub fn get(&self, id: u64) -> Option<&[f32]> {
        self.position(id).map(|position| self.vector(position))
    }

    /// Iterate `(id, vector)` pairs in store order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &[f32])> + '_ {
        self.ids
            .iter()
            .copied()
            .zip(self.data.chunks_exact(self.dimension))
    }

    /// Fail with a dimension mismatch unless `query` matches the store.
    pub fn validate_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimension {
            return Err(VantageError::dimension_mismatch(
                self.dimension,
                query.len(),
            ));
        }
        Ok(())
    }

    /// A copy of this store with every vector scaled to unit length.
    pub fn normalized(&self, parallel: bool) -> Self {
        let mut data = self.data.clone();
        if parallel && self.len() > 100 {
            data.par_chunks_mut(self.dimension).for_each(normalize_in_place);
        } else {
            for row in data.chunks_mut(self.dimension) {
                normalize_in_place(row);
            }
        }

        Self {
            dimension: self.dimension,
            ids: self.ids.clone(),
            data,
            positions: self.positions.clone(),
        }
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_usage(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
            + self.ids.len() * std::mem::size_of::<u64>()
            + self.positions.len() * (std::mem::size_of::<u64>() + std::mem::size_of::<usize>())
    }
}
