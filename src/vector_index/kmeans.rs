//! Seeded, fixed-iteration k-means shared by partitioning and codebook training.
//!
//! Rows are passed as one row-major buffer. Each pass runs an assignment
//! step (nearest centroid, ties to the lowest cluster index), repairs empty
//! clusters with the farthest-point rule, and recomputes every centroid as
//! the mean of its members. There is no convergence-based early exit, so a
//! given `(rows, num_clusters, iterations, seed)` always yields the same
//! model, whether or not the work is spread over the rayon pool.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VantageError};
use crate::util::deadline::{Deadline, check_deadline};
use crate::util::simd;
use crate::vector::distance::{DistanceMeasure, normalize_in_place};

/// Candidate count above which assignment runs in parallel.
const PARALLEL_ASSIGN_THRESHOLD: usize = 1000;

/// How initial centroids are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Initialization {
    /// Distinct rows drawn uniformly at random.
    RandomSample,
    /// Distinct rows drawn by k-means++ distance weighting.
    #[default]
    KMeansPlusPlus,
}

/// k-means configuration.
#[derive(Debug, Clone)]
pub struct KMeans {
    num_clusters: usize,
    initialization: Initialization,
    iterations: usize,
    seed: u64,
    measure: DistanceMeasure,
    spherical: bool,
    parallel: bool,
    deadline: Option<Deadline>,
}

/// The trained centroids and the final assignment of every row.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    /// Centroids, row-major, `num_clusters * dimension` values.
    pub centroids: Vec<f32>,
    /// Cluster index of each input row.
    pub assignments: Vec<usize>,
    /// Dimension of rows and centroids.
    pub dimension: usize,
    /// Number of empty-cluster repairs performed across all passes.
    pub repairs: usize,
}

impl KMeansModel {
    /// Number of clusters.
    pub fn num_clusters(&self) -> usize {
        self.centroids.len() / self.dimension
    }

    /// Centroid of cluster `c`.
    pub fn centroid(&self, c: usize) -> &[f32] {
        &self.centroids[c * self.dimension..(c + 1) * self.dimension]
    }
}

impl KMeans {
    /// Create a k-means run with squared-L2 assignment.
    pub fn new(num_clusters: usize, iterations: usize, seed: u64) -> Self {
        Self {
            num_clusters,
            initialization: Initialization::default(),
            iterations,
            seed,
            measure: DistanceMeasure::SquaredL2,
            spherical: false,
            parallel: true,
            deadline: None,
        }
    }

    /// Assign rows under `measure`; inner-product measures switch to
    /// spherical centroids.
    pub fn with_measure(mut self, measure: DistanceMeasure) -> Self {
        self.measure = measure;
        self.spherical = measure.is_spherical();
        self
    }

    /// Choose how initial centroids are picked.
    pub fn with_initialization(mut self, initialization: Initialization) -> Self {
        self.initialization = initialization;
        self
    }

    /// Enable or disable rayon parallelism.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Abort with a timeout once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Option<Deadline>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Train on `rows` (row-major, `dimension` values per row).
    pub fn fit(&self, rows: &[f32], dimension: usize) -> Result<KMeansModel> {
        if dimension == 0 {
            return Err(VantageError::invalid_parameter(
                "k-means rows must have at least one dimension",
            ));
        }

        let num_rows = rows.len() / dimension;
        if self.num_clusters == 0 {
            return Err(VantageError::invalid_parameter(
                "Number of clusters must be positive",
            ));
        }
        if self.num_clusters > num_rows {
            return Err(VantageError::invalid_parameter(format!(
                "Cannot create {} clusters from {} vectors",
                self.num_clusters, num_rows
            )));
        }

        let mut centroids = self.init_centroids(rows, dimension, num_rows);
        let mut repairs = 0;

        for iteration in 0..self.iterations {
            check_deadline(self.deadline.as_ref(), "k-means training")?;

            let mut assigned = self.assign(rows, dimension, &centroids);
            repairs += self.repair_empty_clusters(rows, dimension, &mut assigned, &mut centroids);
            let assignments: Vec<usize> = assigned.iter().map(|(c, _)| *c).collect();
            centroids = self.update(rows, dimension, &assignments, &centroids);

            debug!(
                "k-means pass {}/{} over {} vectors ({} clusters)",
                iteration + 1,
                self.iterations,
                num_rows,
                self.num_clusters
            );
        }

        check_deadline(self.deadline.as_ref(), "k-means assignment")?;
        let mut assigned = self.assign(rows, dimension, &centroids);
        repairs += self.repair_empty_clusters(rows, dimension, &mut assigned, &mut centroids);

        Ok(KMeansModel {
            centroids,
            assignments: assigned.into_iter().map(|(c, _)| c).collect(),
            dimension,
            repairs,
        })
    }

    /// Seed centroids from distinct rows picked by a seeded RNG.
    fn init_centroids(&self, rows: &[f32], dimension: usize, num_rows: usize) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let picks = match self.initialization {
            Initialization::RandomSample => {
                rand::seq::index::sample(&mut rng, num_rows, self.num_clusters).into_vec()
            }
            Initialization::KMeansPlusPlus => {
                if self.spherical {
                    let mut unit = rows.to_vec();
                    for row in unit.chunks_mut(dimension) {
                        normalize_in_place(row);
                    }
                    self.kmeans_plus_plus(&mut rng, &unit, dimension, num_rows)
                } else {
                    self.kmeans_plus_plus(&mut rng, rows, dimension, num_rows)
                }
            }
        };

        let mut centroids = Vec::with_capacity(self.num_clusters * dimension);
        for position in picks {
            let start = centroids.len();
            centroids.extend_from_slice(&rows[position * dimension..(position + 1) * dimension]);
            if self.spherical {
                normalize_in_place(&mut centroids[start..]);
            }
        }
        centroids
    }

    /// k-means++ seeding: each new seed is drawn with probability
    /// proportional to its squared distance from the seeds chosen so far.
    fn kmeans_plus_plus(
        &self,
        rng: &mut StdRng,
        rows: &[f32],
        dimension: usize,
        num_rows: usize,
    ) -> Vec<usize> {
        let row = |position: usize| &rows[position * dimension..(position + 1) * dimension];

        let mut taken = vec![false; num_rows];
        let mut picks = Vec::with_capacity(self.num_clusters);

        let first = rng.random_range(0..num_rows);
        taken[first] = true;
        picks.push(first);

        let mut min_distances: Vec<f32> = rows
            .chunks(dimension)
            .map(|candidate| simd::squared_l2(candidate, row(first)))
            .collect();

        while picks.len() < self.num_clusters {
            let total: f64 = min_distances
                .iter()
                .zip(&taken)
                .filter(|(_, taken)| !**taken)
                .map(|(distance, _)| *distance as f64)
                .sum();

            let weighted = if total > 0.0 {
                let target = rng.random::<f64>() * total;
                let mut cumsum = 0.0;
                let mut last_positive = None;
                let mut pick = None;
                for (position, distance) in min_distances.iter().enumerate() {
                    if taken[position] || *distance <= 0.0 {
                        continue;
                    }
                    cumsum += *distance as f64;
                    last_positive = Some(position);
                    if cumsum > target {
                        pick = Some(position);
                        break;
                    }
                }
                pick.or(last_positive)
            } else {
                None
            };

            // Every remaining row coincides with a seed: fall back to a
            // uniform pick among the untaken rows.
            let next = match weighted {
                Some(position) => position,
                None => {
                    let remaining: Vec<usize> =
                        (0..num_rows).filter(|position| !taken[*position]).collect();
                    remaining[rng.random_range(0..remaining.len())]
                }
            };

            taken[next] = true;
            picks.push(next);

            let seed_row = row(next);
            for (position, distance) in min_distances.iter_mut().enumerate() {
                let candidate = simd::squared_l2(row(position), seed_row);
                if candidate < *distance {
                    *distance = candidate;
                }
            }
        }

        picks
    }

    /// Nearest centroid and its distance for every row.
    fn assign(&self, rows: &[f32], dimension: usize, centroids: &[f32]) -> Vec<(usize, f32)> {
        let nearest = |row: &[f32]| nearest_centroid(self.measure, row, centroids, dimension);

        if self.parallel && rows.len() / dimension > PARALLEL_ASSIGN_THRESHOLD {
            rows.par_chunks(dimension).map(nearest).collect()
        } else {
            rows.chunks(dimension).map(nearest).collect()
        }
    }

    /// Give every empty cluster the row farthest from its own centroid.
    ///
    /// Rows are taken only from clusters that keep at least one member, and
    /// each row moves at most once per pass. Ties go to the lowest row.
    fn repair_empty_clusters(
        &self,
        rows: &[f32],
        dimension: usize,
        assigned: &mut [(usize, f32)],
        centroids: &mut [f32],
    ) -> usize {
        let mut counts = vec![0usize; self.num_clusters];
        for (cluster, _) in assigned.iter() {
            counts[*cluster] += 1;
        }

        let mut moved = vec![false; assigned.len()];
        let mut repairs = 0;

        for cluster in 0..self.num_clusters {
            if counts[cluster] > 0 {
                continue;
            }

            let mut farthest: Option<(usize, f32)> = None;
            for (position, (owner, distance)) in assigned.iter().enumerate() {
                if moved[position] || counts[*owner] < 2 {
                    continue;
                }
                if farthest.is_none_or(|(_, best)| *distance > best) {
                    farthest = Some((position, *distance));
                }
            }

            let Some((position, _)) = farthest else {
                break;
            };

            counts[assigned[position].0] -= 1;
            counts[cluster] = 1;
            assigned[position] = (cluster, 0.0);
            moved[position] = true;

            let centroid = &mut centroids[cluster * dimension..(cluster + 1) * dimension];
            centroid.copy_from_slice(&rows[position * dimension..(position + 1) * dimension]);
            if self.spherical {
                normalize_in_place(centroid);
            }
            repairs += 1;
        }

        if repairs > 0 {
            debug!("Reseeded {repairs} empty cluster(s) from farthest vectors");
        }
        repairs
    }

    /// Recompute each centroid as the mean of its members.
    fn update(
        &self,
        rows: &[f32],
        dimension: usize,
        assignments: &[usize],
        previous: &[f32],
    ) -> Vec<f32> {
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); self.num_clusters];
        for (position, cluster) in assignments.iter().enumerate() {
            members[*cluster].push(position);
        }

        let mean_of = |cluster: usize| -> Vec<f32> {
            let positions = &members[cluster];
            if positions.is_empty() {
                // Keep the old centroid if no vectors assigned
                return previous[cluster * dimension..(cluster + 1) * dimension].to_vec();
            }

            let mut sum = vec![0.0f32; dimension];
            for position in positions {
                let row = &rows[position * dimension..(position + 1) * dimension];
                for (acc, value) in sum.iter_mut().zip(row) {
                    *acc += value;
                }
            }

            let count = positions.len() as f32;
            for value in sum.iter_mut() {
                *value /= count;
            }
            if self.spherical {
                normalize_in_place(&mut sum);
            }
            sum
        };

        let centroids: Vec<Vec<f32>> = if self.parallel {
            (0..self.num_clusters).into_par_iter().map(mean_of).collect()
        } else {
            (0..self.num_clusters).map(mean_of).collect()
        };
        centroids.concat()
    }
}

/// Index and distance of the nearest centroid, ties to the lowest index.
pub fn nearest_centroid(
    measure: DistanceMeasure,
    row: &[f32],
    centroids: &[f32],
    dimension: usize,
) -> (usize, f32) {
    let mut best_cluster = 0;
    let mut best_distance = f32::INFINITY;

    for (cluster, centroid) in centroids.chunks_exact(dimension).enumerate() {
        let distance = measure.distance(row, centroid);
        if distance < best_distance {
            best_distance = distance;
            best_cluster = cluster;
        }
    }

    (best_cluster, best_distance)
}
