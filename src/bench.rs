//! bench.rs — one complete run: dataset, warmup, measured phase, grading.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    arrival::ArrivalController,
    client::SearchClient,
    collector::{write_enhanced_results, Collector},
    dataset::{DataRow, DataSource},
    engine::{execute_workload, ExecutionReport},
    errors::{LoadGenError, Result},
    params::BenchmarkConfig,
    recall::{enhance_job_results, RecallSummary},
    warmup::{run_warmup, WarmupReport},
};

/// What a run produced.
#[derive(Debug)]
pub struct BenchmarkOutcome {
    pub warmup: WarmupReport,
    pub execution: ExecutionReport,
    /// `None` when recall was left for offline processing or nothing ran.
    pub recall: Option<RecallSummary>,
    /// Run directory holding the JSON snapshot when grading was deferred.
    pub snapshot: Option<PathBuf>,
}

pub struct Benchmark {
    config: BenchmarkConfig,
    client: Arc<dyn SearchClient>,
    source: Box<dyn DataSource>,
    collector: Arc<dyn Collector>,
    output_dir: Option<PathBuf>,
}

impl Benchmark {
    pub fn new(
        config: BenchmarkConfig,
        client: Arc<dyn SearchClient>,
        source: Box<dyn DataSource>,
        collector: Arc<dyn Collector>,
    ) -> Self {
        Self { config, client, source, collector, output_dir: None }
    }

    /// Directory for `enhanced-results.csv` (and, with the `snapshot`
    /// feature, the JSON files offline grading reads).
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    #[inline]
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Load the dataset, warm up, run the measured phase and, when
    /// `compute_recall` is set, grade every executed job.
    pub async fn run(&self, compute_recall: bool) -> Result<BenchmarkOutcome> {
        let rows = Arc::new(self.load_rows()?);

        let warmup = run_warmup(self.client.clone(), &self.config.warmup, self.config.dims, self.config.k).await;

        let controller = ArrivalController::new(self.config.workload.clone(), self.config.dims, self.config.seed)?;
        let execution = execute_workload(controller, self.client.clone(), self.collector.clone(), &self.config).await;

        let (recall, snapshot) = if compute_recall {
            (self.grade(rows, &execution).await?, None)
        } else {
            (None, self.defer_recall(&rows, &execution)?)
        };

        Ok(BenchmarkOutcome { warmup, execution, recall, snapshot })
    }

    fn load_rows(&self) -> Result<Vec<DataRow>> {
        let rows = self.source.load_dataset()?;
        if let Some(bad) = rows.iter().find(|r| r.vector.len() != self.config.dims) {
            return Err(LoadGenError::DimensionMismatch { expected: self.config.dims, found: bad.vector.len() });
        }
        info!(rows = rows.len(), dims = self.config.dims, "loaded dataset");
        Ok(rows)
    }

    async fn grade(&self, rows: Arc<Vec<DataRow>>, execution: &ExecutionReport) -> Result<Option<RecallSummary>> {
        let jobs = execution.executed_jobs();
        info!(jobs = jobs.len(), "computing recall");

        // The evaluator blocks on its own rayon pool.
        let results = tokio::task::spawn_blocking(move || enhance_job_results(&rows, &jobs))
            .await
            .map_err(|e| LoadGenError::Io(format!("recall task: {}", e)))??;

        if let Some(dir) = &self.output_dir {
            let path = write_enhanced_results(dir, &results)?;
            info!(path = %path.display(), "wrote enhanced results");
        }

        let summary = RecallSummary::from_results(&results);
        if let Some(s) = &summary {
            info!(count = s.count, mean = s.mean, min = s.min, p50 = s.p50, p95 = s.p95, "recall");
        }
        Ok(summary)
    }

    /// Persist what offline grading needs. Returns the run directory.
    #[cfg(feature = "snapshot")]
    fn defer_recall(&self, rows: &[DataRow], execution: &ExecutionReport) -> Result<Option<PathBuf>> {
        use crate::snapshot::{write_data_rows, write_run, RunSnapshot};

        let Some(dir) = &self.output_dir else {
            warn!("recall deferred but no output directory set, run data is not kept");
            return Ok(None);
        };
        write_data_rows(dir, rows)?;
        let run = RunSnapshot { jobs: execution.jobs.clone(), sessions: execution.sessions.clone() };
        let path = write_run(dir, &run)?;
        info!(path = %path.display(), "wrote run snapshot for offline recall");
        Ok(Some(dir.clone()))
    }

    #[cfg(not(feature = "snapshot"))]
    fn defer_recall(&self, _rows: &[DataRow], _execution: &ExecutionReport) -> Result<Option<PathBuf>> {
        warn!("recall deferred but the `snapshot` feature is disabled, run data is not kept");
        Ok(None)
    }
}
