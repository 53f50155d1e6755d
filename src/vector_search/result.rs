//! Search result types.

use serde::{Deserialize, Serialize};

use crate::vector::DistanceMeasure;
use crate::vector_search::collector::ScoredCandidate;

/// One ranked hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Candidate id.
    pub id: u64,
    /// Score under the index's measure: dot product, cosine similarity,
    /// or squared L2 distance.
    pub score: f32,
}

/// Hits for one query, best first. Ties are ordered by ascending id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Ranked hits, at most `k`.
    pub hits: Vec<SearchHit>,
    /// Number of candidates scored for this query.
    pub candidates_examined: usize,
}

impl SearchResult {
    /// An empty result.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_ranked(
        ranked: Vec<ScoredCandidate>,
        measure: DistanceMeasure,
        candidates_examined: usize,
    ) -> Self {
        Self {
            hits: ranked
                .into_iter()
                .map(|candidate| SearchHit {
                    id: candidate.id,
                    score: measure.score(candidate.distance),
                })
                .collect(),
            candidates_examined,
        }
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether there are no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Hit ids in rank order.
    pub fn ids(&self) -> Vec<u64> {
        self.hits.iter().map(|hit| hit.id).collect()
    }
}
