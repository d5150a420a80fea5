//! Criterion benchmark entry for knn-loadgen.
//!
//! Run with
//! ```bash
//! cargo bench
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use knn_loadgen::{
    enhance_job_results, generate_vector, nearest_neighbors, nearest_neighbors_sequential, DataRow, Job,
};
use rand::{rngs::StdRng, SeedableRng};

const DIMS: usize = 128;
const NUM_ROWS: usize = 20_000;
const K: usize = 10;

fn dataset() -> Vec<DataRow> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..NUM_ROWS)
        .map(|i| DataRow::new(i as i64, generate_vector(&mut rng, DIMS, 0.0, 1.0), ""))
        .collect()
}

fn bench_exact_knn(c: &mut Criterion) {
    let rows = dataset();
    let query = vec![0.0_f32; DIMS];

    let mut group = c.benchmark_group("exact_knn");
    group.throughput(Throughput::Elements(NUM_ROWS as u64));

    group.bench_function(BenchmarkId::new("sequential", K), |b| {
        b.iter(|| nearest_neighbors_sequential(&query, &rows, K))
    });
    group.bench_function(BenchmarkId::new("chunked", K), |b| b.iter(|| nearest_neighbors(&query, &rows, K)));

    group.finish();
}

fn bench_recall_batch(c: &mut Criterion) {
    let rows = dataset();
    let mut rng = StdRng::seed_from_u64(7);
    let jobs: Vec<Job> = (0..64)
        .map(|i| {
            let mut j = Job::new(format!("J-{}", i), generate_vector(&mut rng, DIMS, 0.0, 1.0));
            j.result_ids = (0..K as i64).collect();
            j
        })
        .collect();

    let mut group = c.benchmark_group("recall_batch");
    group.sample_size(10);
    group.throughput(Throughput::Elements(jobs.len() as u64));
    group.bench_function(BenchmarkId::from_parameter(jobs.len()), |b| {
        b.iter(|| enhance_job_results(&rows, &jobs))
    });
    group.finish();
}

criterion_group!(benches, bench_exact_knn, bench_recall_batch);
criterion_main!(benches);
