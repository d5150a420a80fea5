//! recall.rs — exact ground truth and recall scoring.
//!
//! Brute force over the whole dataset with squared L2. Candidates live in a
//! bounded, ascending list; equal distances keep arrival order, so the
//! chunked (parallel) and sequential paths agree on the exact id sequence.

use std::collections::HashSet;

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::DataRow,
    errors::{LoadGenError, Result},
    math::squared_euclidean,
    workload::Job,
};

/// One candidate neighbour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: i64,
    pub distance: f32,
}

/// At most `k` neighbours, ascending by distance.
#[derive(Debug, Clone, PartialEq)]
pub struct SortedNeighbors {
    k: usize,
    items: Vec<Neighbor>,
}

impl SortedNeighbors {
    pub fn new(k: usize) -> Self {
        Self { k, items: Vec::with_capacity(k) }
    }

    /// Insert before the first entry that is strictly farther, then truncate
    /// to `k`. A full list drops a candidate that is not closer than its worst.
    pub fn insert_sorted(&mut self, n: Neighbor) {
        if let Some(pos) = self.items.iter().position(|cur| n.distance < cur.distance) {
            self.items.insert(pos, n);
            self.items.truncate(self.k);
        } else if self.items.len() < self.k {
            self.items.push(n);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Neighbor] {
        &self.items
    }

    pub fn ids(&self) -> Vec<i64> {
        self.items.iter().map(|n| n.id).collect()
    }
}

/// Single-threaded exact search over `rows`.
pub fn nearest_neighbors_sequential(query: &[f32], rows: &[DataRow], k: usize) -> SortedNeighbors {
    let mut sorted = SortedNeighbors::new(k);
    for row in rows {
        sorted.insert_sorted(Neighbor { id: row.id, distance: squared_euclidean(query, &row.vector) });
    }
    sorted
}

/// Fold per-chunk lists, in chunk order, into one list of capacity `k`.
pub fn merge_neighbors(lists: &[SortedNeighbors], k: usize) -> SortedNeighbors {
    let mut merged = SortedNeighbors::new(k);
    for list in lists {
        for &n in list.as_slice() {
            merged.insert_sorted(n);
        }
    }
    merged
}

/// Parallel exact search: one contiguous chunk per pool thread, merged in order.
pub fn nearest_neighbors(query: &[f32], rows: &[DataRow], k: usize) -> Vec<i64> {
    if rows.is_empty() || k == 0 {
        return Vec::new();
    }
    let workers = rayon::current_num_threads().max(1);
    let chunk_size = (rows.len() + workers - 1) / workers;

    let partials: Vec<SortedNeighbors> = rows
        .par_chunks(chunk_size)
        .map(|chunk| nearest_neighbors_sequential(query, chunk, k))
        .collect();

    merge_neighbors(&partials, k).ids()
}

/// `|result_ids ∩ true top-k| / |result_ids|` with `k = |result_ids|`.
/// An empty result set scores 0.
pub fn calculate_recall(query: &[f32], result_ids: &[i64], rows: &[DataRow]) -> f64 {
    if result_ids.is_empty() {
        return 0.0;
    }
    let truth: HashSet<i64> = nearest_neighbors(query, rows, result_ids.len()).into_iter().collect();
    let matches = result_ids.iter().filter(|id| truth.contains(id)).count();
    matches as f64 / result_ids.len() as f64
}

/// A graded job. Created once by the evaluator and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedJobResult {
    pub job: Job,
    pub recall: f64,
}

/// Score every job on a pool of `min(available parallelism, jobs)` threads.
/// Output order matches input order.
pub fn enhance_job_results(rows: &[DataRow], jobs: &[Job]) -> Result<Vec<EnhancedJobResult>> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cpus.min(jobs.len()))
        .build()
        .map_err(|e| LoadGenError::Io(format!("recall pool: {}", e)))?;

    Ok(pool.install(|| {
        jobs.par_iter()
            .map(|job| EnhancedJobResult {
                recall: calculate_recall(&job.query_vector, &job.result_ids, rows),
                job: job.clone(),
            })
            .collect()
    }))
}

/// Aggregate view over a batch of graded jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecallSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub p50: f64,
    pub p95: f64,
}

impl RecallSummary {
    pub fn from_results(results: &[EnhancedJobResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let mut recalls: Vec<OrderedFloat<f64>> = results.iter().map(|r| OrderedFloat(r.recall)).collect();
        recalls.sort_unstable();
        let len = recalls.len();
        let pick = |q: f64| recalls[((len as f64 * q) as usize).min(len - 1)].into_inner();
        Some(Self {
            count: len,
            mean: recalls.iter().map(|r| r.into_inner()).sum::<f64>() / len as f64,
            min: recalls[0].into_inner(),
            p50: pick(0.50),
            p95: pick(0.95),
        })
    }
}
