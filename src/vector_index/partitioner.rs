//! Spatial partitioning of the database into leaves.

use log::{info, warn};

use crate::error::{Result, VantageError};
use crate::util::deadline::Deadline;
use crate::vector::{DistanceMeasure, VectorStore};
use crate::vector_index::kmeans::{Initialization, KMeans};

/// One partition cell: a centroid and the candidates closest to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// Representative point of the leaf.
    pub centroid: Vec<f32>,
    /// Member ids, in store order.
    pub members: Vec<u64>,
    /// Store positions of the members, parallel to `members`.
    pub(crate) positions: Vec<usize>,
}

impl Leaf {
    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the leaf has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Store positions of the members.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }
}

/// The leaves produced by a [`Partitioner`].
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionTable {
    leaves: Vec<Leaf>,
    measure: DistanceMeasure,
}

impl PartitionTable {
    /// A table with a single leaf holding the whole store.
    pub fn single_leaf(store: &VectorStore, measure: DistanceMeasure) -> Self {
        let dimension = store.dimension();
        let mut centroid = vec![0.0f32; dimension];
        for (_, vector) in store.iter() {
            for (acc, value) in centroid.iter_mut().zip(vector) {
                *acc += value;
            }
        }
        for value in centroid.iter_mut() {
            *value /= store.len() as f32;
        }

        Self {
            leaves: vec![Leaf {
                centroid,
                members: store.ids().to_vec(),
                positions: (0..store.len()).collect(),
            }],
            measure,
        }
    }

    /// All leaves, in centroid order.
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the table has no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Measure used to compare queries against centroids.
    pub fn measure(&self) -> DistanceMeasure {
        self.measure
    }

    /// Indices of the `count` leaves nearest to `query`, nearest first.
    ///
    /// `count` is clamped to the number of leaves. Ties go to the lower
    /// leaf index.
    pub fn nearest_leaves(&self, query: &[f32], count: usize) -> Vec<usize> {
        let count = count.min(self.leaves.len());
        if count == self.leaves.len() && count == 1 {
            return vec![0];
        }

        let mut scored: Vec<(f32, usize)> = self
            .leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| (self.measure.distance(query, &leaf.centroid), i))
            .collect();

        let by_distance = |a: &(f32, usize), b: &(f32, usize)| {
            a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
        };
        if count < scored.len() {
            scored.select_nth_unstable_by(count, by_distance);
            scored.truncate(count);
        }
        scored.sort_unstable_by(by_distance);
        scored.into_iter().map(|(_, i)| i).collect()
    }

    /// Leaf index of every candidate, keyed by store position.
    pub fn assignments(&self, num_candidates: usize) -> Vec<usize> {
        let mut assignments = vec![0; num_candidates];
        for (leaf_index, leaf) in self.leaves.iter().enumerate() {
            for position in &leaf.positions {
                assignments[*position] = leaf_index;
            }
        }
        assignments
    }
}

/// Clusters a [`VectorStore`] into leaves by iterative centroid refinement.
#[derive(Debug, Clone)]
pub struct Partitioner {
    measure: DistanceMeasure,
    initialization: Initialization,
    parallel: bool,
    deadline: Option<Deadline>,
}

impl Partitioner {
    /// Create a partitioner that assigns candidates under `measure`.
    pub fn new(measure: DistanceMeasure) -> Self {
        Self {
            measure,
            initialization: Initialization::default(),
            parallel: true,
            deadline: None,
        }
    }

    /// Choose how the initial centroids are sampled.
    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    /// Enable or disable parallel assignment and update.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Abort with a timeout once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Partition `store` into `num_leaves` leaves.
    ///
    /// Centroids start at `num_leaves` distinct candidates sampled with
    /// `seed` (k-means++ weighting unless configured otherwise) and are
    /// refined for exactly `training_iterations` passes. Every candidate
    /// ends up in exactly one leaf and no leaf is left empty.
    pub fn partition(
        &self,
        store: &VectorStore,
        num_leaves: usize,
        training_iterations: usize,
        seed: u64,
    ) -> Result<PartitionTable> {
        if num_leaves == 0 {
            return Err(VantageError::invalid_parameter(
                "num_leaves must be positive",
            ));
        }
        if num_leaves > store.len() {
            return Err(VantageError::invalid_parameter(format!(
                "num_leaves ({num_leaves}) exceeds the number of candidates ({})",
                store.len()
            )));
        }

        info!(
            "Partitioning {} vectors into {} leaves ({} passes, {})",
            store.len(),
            num_leaves,
            training_iterations,
            self.measure
        );

        let model = KMeans::new(num_leaves, training_iterations, seed)
            .with_measure(self.measure)
            .with_initialization(self.initialization)
            .with_parallel(self.parallel)
            .with_deadline(self.deadline)
            .fit(store.rows(), store.dimension())?;

        if model.repairs > 0 {
            warn!(
                "Partitioning reseeded {} empty leaf/leaves from farthest candidates",
                model.repairs
            );
        }

        let mut leaves: Vec<Leaf> = (0..num_leaves)
            .map(|leaf| Leaf {
                centroid: model.centroid(leaf).to_vec(),
                members: Vec::new(),
                positions: Vec::new(),
            })
            .collect();

        for (position, leaf) in model.assignments.iter().enumerate() {
            leaves[*leaf].members.push(store.id(position));
            leaves[*leaf].positions.push(position);
        }

        Ok(PartitionTable {
            leaves,
            measure: self.measure,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn clustered_store() -> VectorStore {
        let mut candidates = Vec::new();
        for i in 0..30u64 {
            let offset = (i % 3) as f32 * 20.0;
            let jitter = (i as f32 * 0.7).sin() * 0.5;
            candidates.push((i, vec![offset + jitter, offset - jitter]));
        }
        VectorStore::new(candidates).unwrap()
    }

    #[test]
    fn test_leaves_partition_the_id_set() {
        let store = clustered_store();
        let table = Partitioner::new(DistanceMeasure::SquaredL2)
            .partition(&store, 3, 10, 11)
            .unwrap();

        assert_eq!(table.len(), 3);
        let mut seen = HashSet::new();
        for leaf in table.leaves() {
            assert!(!leaf.is_empty());
            for id in &leaf.members {
                assert!(seen.insert(*id), "id {id} appears in two leaves");
            }
        }
        assert_eq!(seen.len(), store.len());
    }

    #[test]
    fn test_clusters_recovered() {
        let store = clustered_store();
        let table = Partitioner::new(DistanceMeasure::SquaredL2)
            .partition(&store, 3, 10, 3)
            .unwrap();

        for leaf in table.leaves() {
            let group = leaf.members[0] % 3;
            assert!(leaf.members.iter().all(|id| id % 3 == group));
        }
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let store = clustered_store();
        let partitioner = Partitioner::new(DistanceMeasure::SquaredL2);
        let a = partitioner.partition(&store, 4, 5, 99).unwrap();
        let b = partitioner
            .clone()
            .with_parallel(false)
            .partition(&store, 4, 5, 99)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_sample_initialization_keeps_invariant() {
        let store = clustered_store();
        let table = Partitioner::new(DistanceMeasure::SquaredL2)
            .with_initialization(Initialization::RandomSample)
            .partition(&store, 5, 4, 8)
            .unwrap();
        let total: usize = table.leaves().iter().map(Leaf::len).sum();
        assert_eq!(total, store.len());
        assert!(table.leaves().iter().all(|leaf| !leaf.is_empty()));
    }

    #[test]
    fn test_invalid_leaf_counts() {
        let store = clustered_store();
        let partitioner = Partitioner::new(DistanceMeasure::SquaredL2);
        assert!(matches!(
            partitioner.partition(&store, 0, 5, 0),
            Err(VantageError::InvalidParameter(_))
        ));
        assert!(matches!(
            partitioner.partition(&store, 31, 5, 0),
            Err(VantageError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_one_leaf_per_candidate() {
        let store = clustered_store();
        let table = Partitioner::new(DistanceMeasure::SquaredL2)
            .partition(&store, 30, 2, 5)
            .unwrap();
        assert!(table.leaves().iter().all(|leaf| leaf.len() == 1));
    }

    #[test]
    fn test_nearest_leaves_clamps_and_orders() {
        let store = clustered_store();
        let table = Partitioner::new(DistanceMeasure::SquaredL2)
            .partition(&store, 3, 10, 3)
            .unwrap();

        let nearest = table.nearest_leaves(&[40.0, 40.0], 10);
        assert_eq!(nearest.len(), 3);
        let first = &table.leaves()[nearest[0]];
        assert!(first.members.iter().all(|id| id % 3 == 2));
    }

    #[test]
    fn test_assignments_follow_leaves() {
        let store = clustered_store();
        let table = Partitioner::new(DistanceMeasure::SquaredL2)
            .partition(&store, 3, 10, 3)
            .unwrap();
        let assignments = table.assignments(store.len());
        for (leaf_index, leaf) in table.leaves().iter().enumerate() {
            for position in leaf.positions() {
                assert_eq!(assignments[*position], leaf_index);
            }
        }
    }
}
