//! Criterion benchmarks for the retrieval engine.
//!
//! - Distance kernels
//! - Brute-force search
//! - Partitioned and quantized index search
//! - Batched search

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use vantage::{BruteForceSearcher, DistanceMeasure, VectorStore, create_builder};

fn generate_test_vectors(count: usize, dimension: usize) -> Vec<Vec<f32>> {
    let mut vectors = Vec::with_capacity(count);
    for i in 0..count {
        let mut data = Vec::with_capacity(dimension);
        for j in 0..dimension {
            let value = ((i as f32 * 0.1 + j as f32 * 0.01).sin() * 0.5 + 0.5) * 2.0 - 1.0;
            data.push(value);
        }
        vectors.push(data);
    }
    vectors
}

fn database(count: usize, dimension: usize) -> Vec<(u64, Vec<f32>)> {
    generate_test_vectors(count, dimension)
        .into_iter()
        .enumerate()
        .map(|(i, vector)| (i as u64, vector))
        .collect()
}

fn bench_distances(c: &mut Criterion) {
    let dimension = 128;
    let vectors = generate_test_vectors(101, dimension);
    let query = &vectors[0];
    let targets = &vectors[1..101];

    let mut group = c.benchmark_group("distance_measures");
    for measure in [
        DistanceMeasure::DotProduct,
        DistanceMeasure::SquaredL2,
        DistanceMeasure::Cosine,
    ] {
        group.bench_function(measure.name(), |b| {
            b.iter(|| {
                for target in targets {
                    black_box(measure.distance(black_box(query), black_box(target)));
                }
            })
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let dimension = 64;
    let count = 20_000;
    let database = database(count, dimension);
    let queries = generate_test_vectors(64, dimension);

    let store = Arc::new(VectorStore::new(database.clone()).expect("valid database"));
    let brute_force = BruteForceSearcher::new(store, DistanceMeasure::DotProduct);

    let index = create_builder(database, 10, DistanceMeasure::DotProduct)
        .expect("valid database")
        .with_partitioning(100, 10, 8, 42)
        .with_quantization(2)
        .with_reordering(100)
        .build("bench")
        .expect("index build");

    let mut group = c.benchmark_group("search");
    group.throughput(Throughput::Elements(1));

    group.bench_function("brute_force_k10", |b| {
        b.iter(|| brute_force.search(black_box(&queries[0]), 10))
    });
    group.bench_function("indexed_k10", |b| {
        b.iter(|| index.search(black_box(&queries[0]), 10))
    });
    group.finish();

    let mut group = c.benchmark_group("batched_search");
    group.throughput(Throughput::Elements(queries.len() as u64));
    for parallel in [false, true] {
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(name, |b| {
            b.iter(|| index.search_batched(black_box(&queries), 10, parallel))
        });
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let database = database(5_000, 32);

    let mut group = c.benchmark_group("build");
    group.sample_size(10);
    group.bench_function("partition_and_quantize", |b| {
        b.iter(|| {
            create_builder(database.clone(), 10, DistanceMeasure::SquaredL2)
                .expect("valid database")
                .with_partitioning(50, 5, 6, 7)
                .with_quantization(4)
                .build("bench")
        })
    });
    group.finish();
}

criterion_group!(benches, bench_distances, bench_search, bench_build);
criterion_main!(benches);
