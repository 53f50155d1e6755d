use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vantage::error::{Result, VantageError};
use vantage::vector_search::{BatchOptions, SearchParams, mean_recall_at_k};
use vantage::{BruteForceSearcher, DistanceMeasure, VectorStore, create_builder};

const DIMENSION: usize = 16;
const NUM_CLUSTERS: usize = 10;
const PER_CLUSTER: usize = 100;

fn cluster_centers(rng: &mut StdRng) -> Vec<Vec<f32>> {
    (0..NUM_CLUSTERS)
        .map(|_| {
            (0..DIMENSION)
                .map(|_| rng.random_range(-50.0..50.0))
                .collect()
        })
        .collect()
}

fn jitter(center: &[f32], spread: f32, rng: &mut StdRng) -> Vec<f32> {
    center
        .iter()
        .map(|value| value + rng.random_range(-spread..spread))
        .collect()
}

/// Well-separated blobs plus queries drawn near the blob centers.
fn clustered_dataset(seed: u64) -> (Vec<(u64, Vec<f32>)>, Vec<Vec<f32>>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let centers = cluster_centers(&mut rng);

    let mut database = Vec::with_capacity(NUM_CLUSTERS * PER_CLUSTER);
    for (cluster, center) in centers.iter().enumerate() {
        for i in 0..PER_CLUSTER {
            let id = (cluster * PER_CLUSTER + i) as u64;
            database.push((id, jitter(center, 1.0, &mut rng)));
        }
    }

    let queries = (0..50)
        .map(|q| jitter(&centers[q % NUM_CLUSTERS], 0.5, &mut rng))
        .collect();

    (database, queries)
}

fn exact_results(
    database: &[(u64, Vec<f32>)],
    queries: &[Vec<f32>],
    measure: DistanceMeasure,
    k: usize,
) -> Result<Vec<vantage::SearchResult>> {
    let store = Arc::new(VectorStore::new(database.to_vec())?);
    let searcher = BruteForceSearcher::new(store, measure);
    queries.iter().map(|query| searcher.search(query, k)).collect()
}

#[test]
fn partitioned_search_recall_on_separated_clusters() -> Result<()> {
    let (database, queries) = clustered_dataset(3);
    let exact = exact_results(&database, &queries, DistanceMeasure::SquaredL2, 10)?;

    let index = create_builder(database, 10, DistanceMeasure::SquaredL2)?
        .with_partitioning(10, 3, 12, 17)
        .build("clusters")?;

    let approximate = queries
        .iter()
        .map(|query| index.search(query, 10))
        .collect::<Result<Vec<_>>>()?;

    let recall = mean_recall_at_k(&approximate, &exact);
    assert!(recall >= 0.9, "recall@10 was {recall}");
    Ok(())
}

#[test]
fn quantized_search_with_reordering_recall() -> Result<()> {
    let (database, queries) = clustered_dataset(5);

    for measure in [
        DistanceMeasure::SquaredL2,
        DistanceMeasure::DotProduct,
        DistanceMeasure::Cosine,
    ] {
        let exact = exact_results(&database, &queries, measure, 10)?;
        let index = create_builder(database.clone(), 10, measure)?
            .with_partitioning(10, 3, 12, 17)
            .with_quantization(2)
            .with_reordering(100)
            .build("quantized")?;

        let approximate = queries
            .iter()
            .map(|query| index.search(query, 10))
            .collect::<Result<Vec<_>>>()?;

        let recall = mean_recall_at_k(&approximate, &exact);
        assert!(recall >= 0.9, "{measure} recall@10 was {recall}");
    }
    Ok(())
}

#[test]
fn quantized_cosine_recall_without_reordering() -> Result<()> {
    let (database, queries) = clustered_dataset(5);
    let exact = exact_results(&database, &queries, DistanceMeasure::Cosine, 10)?;

    let index = create_builder(database, 10, DistanceMeasure::Cosine)?
        .with_partitioning(10, 3, 12, 17)
        .with_quantization(2)
        .build("cosine")?;

    let approximate = queries
        .iter()
        .map(|query| index.search(query, 10))
        .collect::<Result<Vec<_>>>()?;

    // Lookup-table scores alone must still rank the right neighbourhood.
    let recall = mean_recall_at_k(&approximate, &exact);
    assert!(recall >= 0.7, "cosine recall@10 was {recall}");

    for result in &approximate {
        for hit in &result.hits {
            assert!(hit.score > 0.9, "cosine score {} too low", hit.score);
        }
    }
    Ok(())
}

#[test]
fn single_unquantized_leaf_equals_brute_force() -> Result<()> {
    let (database, queries) = clustered_dataset(7);

    for measure in [
        DistanceMeasure::DotProduct,
        DistanceMeasure::SquaredL2,
        DistanceMeasure::Cosine,
    ] {
        let exact = exact_results(&database, &queries, measure, 15)?;
        let index = create_builder(database.clone(), 15, measure)?
            .with_partitioning(1, 1, 5, 0)
            .build("degenerate")?;

        for (query, expected) in queries.iter().zip(&exact) {
            assert_eq!(&index.search(query, 15)?, expected, "{measure}");
        }
    }
    Ok(())
}

#[test]
fn reordering_never_keeps_worse_than_retained_set() -> Result<()> {
    let (database, queries) = clustered_dataset(11);
    let store = Arc::new(VectorStore::new(database.clone())?);
    let measure = DistanceMeasure::SquaredL2;
    let retained = 30;

    let builder = create_builder(database, 5, measure)?
        .with_partitioning(10, 2, 8, 4)
        .with_quantization_config(vantage::vector_index::QuantizationConfig {
            dimensions_per_block: 8,
            codebook_size: 16,
            ..Default::default()
        });
    let approximate = builder.build("approximate")?;
    let reordered = builder.with_reordering(retained).build("reordered")?;

    for query in &queries {
        let candidates = approximate.search(query, retained)?;
        let worst = candidates
            .ids()
            .iter()
            .filter_map(|id| store.get(*id))
            .map(|vector| measure.distance(query, vector))
            .fold(f32::MIN, f32::max);

        let result = reordered.search(query, 5)?;
        let allowed: HashSet<u64> = candidates.ids().into_iter().collect();
        for hit in &result.hits {
            assert!(allowed.contains(&hit.id));
            assert!(hit.score <= worst + 1e-3);
        }
        for pair in result.hits.windows(2) {
            assert!(pair[0].score <= pair[1].score);
        }
    }
    Ok(())
}

#[test]
fn two_cluster_scenario_is_independent_of_quantization() -> Result<()> {
    let database = vec![
        (1, vec![0.0, 0.0]),
        (2, vec![0.2, 0.1]),
        (3, vec![0.1, 0.3]),
        (4, vec![10.0, 10.0]),
        (5, vec![10.2, 9.9]),
        (6, vec![9.8, 10.1]),
    ];
    let centroid_a = [0.1, 0.4 / 3.0];

    let plain = create_builder(database.clone(), 1, DistanceMeasure::SquaredL2)?
        .with_partitioning(2, 1, 10, 1)
        .build("plain")?;
    assert_eq!(plain.search(&centroid_a, 1)?.ids(), vec![2]);

    for dimensions_per_block in [1, 2] {
        let quantized = create_builder(database.clone(), 1, DistanceMeasure::SquaredL2)?
            .with_partitioning(2, 1, 10, 1)
            .with_quantization(dimensions_per_block)
            .build("quantized")?;
        assert_eq!(quantized.search(&centroid_a, 1)?.ids(), vec![2]);
    }
    Ok(())
}

#[test]
fn batched_results_follow_query_order() -> Result<()> {
    let (database, queries) = clustered_dataset(13);
    let index = create_builder(database, 5, DistanceMeasure::SquaredL2)?
        .with_partitioning(10, 3, 8, 2)
        .with_quantization(4)
        .with_reordering(20)
        .build("batched")?;

    let options = BatchOptions::new().with_parallel(true).with_num_threads(3);
    let batched = index.search_batched_with(&queries, 5, &options)?;
    assert_eq!(batched.len(), queries.len());
    for (query, result) in queries.iter().zip(batched) {
        assert_eq!(result?, index.search(query, 5)?);
    }
    Ok(())
}

#[test]
fn malformed_query_does_not_abort_batch() -> Result<()> {
    let (database, mut queries) = clustered_dataset(17);
    queries[2] = vec![1.0; DIMENSION - 1];

    let index = create_builder(database, 5, DistanceMeasure::SquaredL2)?
        .with_partitioning(10, 3, 8, 2)
        .build("isolated")?;

    let results = index.search_batched(&queries, 5, true)?;
    assert!(matches!(
        results[2],
        Err(VantageError::DimensionMismatch {
            expected: DIMENSION,
            actual: 15
        })
    ));
    assert!(results.iter().enumerate().all(|(i, r)| i == 2 || r.is_ok()));

    let fail_fast = BatchOptions::new().with_parallel(true).with_fail_fast(true);
    assert!(index.search_batched_with(&queries, 5, &fail_fast).is_err());
    Ok(())
}

#[test]
fn k_and_leaf_count_edge_cases() -> Result<()> {
    let (database, queries) = clustered_dataset(19);
    let index = create_builder(database, 5, DistanceMeasure::SquaredL2)?
        .with_partitioning(4, 2, 8, 2)
        .build("edges")?;

    assert!(index.search(&queries[0], 0)?.is_empty());

    // Over-broad leaf counts clamp to a full scan.
    let params = SearchParams::new(5).with_num_leaves_to_search(1_000);
    let clamped = index.search_with(&queries[0], &params)?;
    assert_eq!(clamped.candidates_examined, NUM_CLUSTERS * PER_CLUSTER);

    // k beyond the frontier returns what the frontier holds.
    let params = SearchParams::new(5_000).with_num_leaves_to_search(4);
    let everything = index.search_with(&queries[0], &params)?;
    assert_eq!(everything.len(), NUM_CLUSTERS * PER_CLUSTER);

    assert!(matches!(
        index.search(&[0.0; 3], 1),
        Err(VantageError::DimensionMismatch { .. })
    ));
    Ok(())
}

#[test]
fn builds_are_deterministic() -> Result<()> {
    let (database, _) = clustered_dataset(23);
    let builder = create_builder(database, 5, DistanceMeasure::Cosine)?
        .with_partitioning(8, 2, 6, 99)
        .with_quantization(4);

    let first = builder.build("first")?;
    let second = builder.build("second")?;

    assert_eq!(first.partitions(), second.partitions());
    assert_eq!(first.codebook(), second.codebook());
    assert_eq!(first.encoded_vectors(), second.encoded_vectors());
    Ok(())
}

#[test]
fn leaves_partition_the_candidate_ids() -> Result<()> {
    let (database, _) = clustered_dataset(29);
    let expected: HashSet<u64> = database.iter().map(|(id, _)| *id).collect();

    let index = create_builder(database, 5, DistanceMeasure::DotProduct)?
        .with_partitioning(25, 5, 6, 3)
        .build("invariant")?;

    let mut seen = HashSet::new();
    for leaf in index.partitions().leaves() {
        assert!(!leaf.is_empty());
        for id in &leaf.members {
            assert!(seen.insert(*id), "id {id} appears in two leaves");
        }
    }
    assert_eq!(seen, expected);

    let stats = index.stats();
    assert_eq!(stats.num_leaves, 25);
    assert_eq!(stats.empty_leaves, 0);
    assert_eq!(stats.num_candidates, 1_000);
    assert!(stats.to_json()?.contains("\"num_leaves\": 25"));
    Ok(())
}
