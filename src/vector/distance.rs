//! Distance measures for vector similarity calculation.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VantageError};
use crate::util::simd;

/// Distance measures supported by the retrieval engine.
///
/// Every measure is exposed internally as a distance where smaller is
/// better, so ranking code never branches on the measure. Reported scores
/// use the measure's natural value (see [`DistanceMeasure::score`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMeasure {
    /// Inner product similarity (higher is more similar).
    #[default]
    DotProduct,
    /// Squared Euclidean distance (lower is more similar).
    SquaredL2,
    /// Cosine similarity (higher is more similar).
    Cosine,
}

impl DistanceMeasure {
    /// Calculate the distance between two vectors using this measure.
    ///
    /// Callers are responsible for passing equal-length slices; use
    /// [`DistanceMeasure::checked_distance`] at API boundaries.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMeasure::DotProduct => -simd::dot(a, b),
            DistanceMeasure::SquaredL2 => simd::squared_l2(a, b),
            DistanceMeasure::Cosine => {
                let norm_a = simd::norm(a);
                let norm_b = simd::norm(b);
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0 // Maximum distance for zero vectors
                } else {
                    1.0 - simd::dot(a, b) / (norm_a * norm_b)
                }
            }
        }
    }

    /// Calculate the distance after checking the two lengths agree.
    pub fn checked_distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(VantageError::dimension_mismatch(a.len(), b.len()));
        }
        Ok(self.distance(a, b))
    }

    /// Convert an internal distance back to the score reported to callers.
    ///
    /// Dot product and cosine report similarities, squared L2 reports the
    /// distance itself.
    #[inline]
    pub fn score(&self, distance: f32) -> f32 {
        match self {
            DistanceMeasure::DotProduct => -distance,
            DistanceMeasure::SquaredL2 => distance,
            DistanceMeasure::Cosine => 1.0 - distance,
        }
    }

    /// Whether larger reported scores are better.
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, DistanceMeasure::SquaredL2)
    }

    /// Order two reported scores best-first under this measure.
    pub fn compare_scores(&self, a: f32, b: f32) -> Ordering {
        if self.higher_is_better() {
            b.total_cmp(&a)
        } else {
            a.total_cmp(&b)
        }
    }

    /// Whether clustering under this measure works on unit-length centroids.
    ///
    /// Inner-product and cosine partitioning use spherical k-means: the
    /// mean of a leaf is re-normalized so that no centroid wins every
    /// assignment by norm alone.
    pub fn is_spherical(&self) -> bool {
        !matches!(self, DistanceMeasure::SquaredL2)
    }

    /// Get the name of this distance measure.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMeasure::DotProduct => "dot_product",
            DistanceMeasure::SquaredL2 => "squared_l2",
            DistanceMeasure::Cosine => "cosine",
        }
    }

    /// Parse a distance measure from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dot_product" | "dot" => Ok(DistanceMeasure::DotProduct),
            "squared_l2" | "l2" | "euclidean" => Ok(DistanceMeasure::SquaredL2),
            "cosine" => Ok(DistanceMeasure::Cosine),
            _ => Err(VantageError::invalid_parameter(format!(
                "Unknown distance measure: {s}"
            ))),
        }
    }
}

impl fmt::Display for DistanceMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalize a vector to unit length in place. Zero vectors are left as is.
pub fn normalize_in_place(vector: &mut [f32]) {
    let norm = simd::norm(vector);
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Get a normalized copy of a vector.
pub fn normalized(vector: &[f32]) -> Vec<f32> {
    let mut copy = vector.to_vec();
    normalize_in_place(&mut copy);
    copy
}
