//! knn-loadgen — open-loop load generator for approximate k-NN services.
//!
//! * Poisson arrivals of independent queries and multi-step user sessions
//! * Bounded worker pool; session continuations jump the queue
//! * Exact brute-force ground truth for recall, parallel via `rayon`
//! * Optional AVX2 distance kernel behind `--features simd`
//! * Optional JSON run snapshots for offline grading (`--features snapshot`)
//!
//! ## Quick-start
//! ```rust
//! use std::{sync::Arc, time::Duration};
//! use knn_loadgen::{Benchmark, BenchmarkBuilder, BruteForceClient, DataRow, NullCollector};
//!
//! # #[tokio::main(flavor = "multi_thread", worker_threads = 2)]
//! # async fn main() -> knn_loadgen::Result<()> {
//! let rows: Vec<DataRow> = (0..100)
//!     .map(|i| DataRow::new(i, vec![i as f32; 4], format!("w{}", i)))
//!     .collect();
//!
//! let config = BenchmarkBuilder::default()
//!     .dims(4)
//!     .target_qps(200.0)
//!     .duration(Duration::from_millis(100))
//!     .workers(2)
//!     .build()?;
//!
//! let client = Arc::new(BruteForceClient::new(Arc::new(rows.clone())));
//! let outcome = Benchmark::new(config, client, Box::new(rows), Arc::new(NullCollector))
//!     .run(true)
//!     .await?;
//! assert!(outcome.execution.dropped == 0);
//! # Ok(())
//! # }
//! ```

mod arrival;
mod bench;
mod client;
mod collector;
mod dataset;
mod engine;
mod errors;
mod math;
mod params;
mod recall;
mod vecgen;
mod warmup;
mod workload;

#[cfg(feature = "snapshot")]
pub mod snapshot;

pub use arrival::ArrivalController;
pub use bench::{Benchmark, BenchmarkOutcome};
pub use client::{BruteForceClient, SearchClient, SearchResponse};
pub use collector::{
    write_enhanced_results, Collector, CsvCollector, MemoryCollector, NullCollector, ENHANCED_RESULTS_FILE,
};
pub use dataset::{DataRow, DataSource, TextDataset, Vector};
pub use engine::{execute_workload, ExecutionReport};
pub use errors::{LoadGenError, Result};
pub use math::squared_euclidean;
pub use params::{BenchmarkBuilder, BenchmarkConfig, WarmupParams, WorkloadParams};
pub use recall::{
    calculate_recall, enhance_job_results, merge_neighbors, nearest_neighbors, nearest_neighbors_sequential,
    EnhancedJobResult, Neighbor, RecallSummary, SortedNeighbors,
};
pub use vecgen::{generate_query_vectors, generate_vector};
pub use warmup::{run_warmup, WarmupReport};
pub use workload::{
    collect_executed_jobs, next_query, Execution, Job, SessionStatus, StepContext, TimedWorkload, UserSession,
    Workload,
};
