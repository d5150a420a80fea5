use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use knn_loadgen::{
    calculate_recall, enhance_job_results, ArrivalController, Benchmark, BenchmarkBuilder, BruteForceClient,
    CsvCollector, DataRow, Execution, Job, MemoryCollector, SearchClient, SearchResponse, SessionStatus,
    StepContext, TimedWorkload, Workload, WorkloadParams,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn on_line(distances: &[f32]) -> Vec<DataRow> {
    distances
        .iter()
        .enumerate()
        .map(|(i, &d)| DataRow::new(i as i64 + 1, vec![d, 0.0], format!("p{}", i + 1)))
        .collect()
}

#[test]
fn exact_answers_score_one() {
    let rows = on_line(&[1.0, 2.0, 3.0]);
    assert_eq!(calculate_recall(&[0.0, 0.0], &[1, 2, 3], &rows), 1.0);
}

#[test]
fn answers_outside_the_true_set_score_zero() {
    let rows = on_line(&[1.0, 2.0, 3.0]);
    assert_eq!(calculate_recall(&[0.0, 0.0], &[97, 98, 99], &rows), 0.0);
}

#[test]
fn half_right_answers_score_half() {
    let rows = on_line(&[1.0, 2.0, 3.0, 4.0]);
    let mut job = Job::new("J-0".into(), vec![0.0, 0.0]);
    job.result_ids = vec![1, 3];
    let graded = enhance_job_results(&rows, &[job]).unwrap();
    assert_eq!(graded[0].recall, 0.5);
}

/// Top hit of call `n` is `[n + 0.5; dims]`.
#[derive(Default)]
struct CountingClient {
    calls: AtomicUsize,
}

impl CountingClient {
    fn top(n: usize, dims: usize) -> Vec<f32> {
        vec![n as f32 + 0.5; dims]
    }
}

#[async_trait]
impl SearchClient for CountingClient {
    async fn search(
        &self,
        query: &[f32],
        _k: usize,
        with_vectors: bool,
        _cancel: &CancellationToken,
    ) -> knn_loadgen::Result<SearchResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SearchResponse {
            ids: vec![n as i64],
            vectors: with_vectors.then(|| vec![Self::top(n, query.len())]),
        })
    }
}

#[tokio::test]
async fn three_step_session_derives_follow_up_queries() {
    let params = WorkloadParams {
        job_probability: 0.0,
        min_session_length: 3,
        max_session_length: 3,
        ..WorkloadParams::default()
    };
    let dims = 4;
    let mut controller = ArrivalController::new(params, dims, 11).unwrap();

    let Workload::Session(session) = controller.generate_workload() else {
        panic!("job probability 0 must yield sessions");
    };
    assert_eq!(session.jobs.len(), 3);
    let offsets: Vec<Vec<f32>> = session.jobs.iter().map(|j| j.query_vector.clone()).collect();

    let client = CountingClient::default();
    let cancel = CancellationToken::new();
    let collector = MemoryCollector::new();
    let (tx, mut rx) = mpsc::channel(1);
    let ctx = StepContext { client: &client, k: 1, cancel: &cancel, continuations: &tx, collector: &collector };

    let mut next = TimedWorkload::now(Workload::Session(session));
    let mut executions = 0;
    let done = loop {
        let out = next.work.execute(&ctx, next.scheduled_at.elapsed()).await;
        executions += 1;
        match out {
            Execution::Continued => next = TimedWorkload::now(Workload::Session(rx.recv().await.unwrap())),
            Execution::Terminal { work: Workload::Session(s), error: None } => break s,
            other => panic!("unexpected outcome {:?}", other),
        }
    };

    assert_eq!(executions, 3);
    assert_eq!(done.status, SessionStatus::Complete);
    assert_eq!(done.current_step(), 3);
    for step in 1..3 {
        let expected: Vec<f32> = CountingClient::top(step - 1, dims)
            .iter()
            .zip(&offsets[step])
            .map(|(t, o)| t + o)
            .collect();
        assert_eq!(done.jobs[step].query_vector, expected);
    }
    assert_eq!(collector.jobs().len(), 3);
    assert_eq!(collector.sessions().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn full_run_writes_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let rows: Vec<DataRow> = (0..150)
        .map(|i| DataRow::new(i, vec![(i % 13) as f32, (i / 13) as f32, 0.5], ""))
        .collect();
    let config = BenchmarkBuilder::default()
        .dims(3)
        .target_qps(300.0)
        .duration(Duration::from_millis(250))
        .workers(4)
        .k(4)
        .session_length(2, 4)
        .build()
        .unwrap();

    let collector = Arc::new(CsvCollector::create(dir.path(), "benchmark").unwrap());
    let client = Arc::new(BruteForceClient::new(Arc::new(rows.clone())));
    let outcome = Benchmark::new(config, client, Box::new(rows), collector.clone())
        .output_dir(dir.path())
        .run(true)
        .await
        .unwrap();
    collector.flush().unwrap();

    let jobs_csv = fs::read_to_string(dir.path().join("benchmark-jobs.csv")).unwrap();
    assert!(jobs_csv.starts_with("timestamp_us,job_id,is_session"));
    assert!(jobs_csv.lines().count() > 1);
    assert!(dir.path().join("benchmark-sessions.csv").exists());

    let enhanced = fs::read_to_string(dir.path().join(knn_loadgen::ENHANCED_RESULTS_FILE)).unwrap();
    assert_eq!(enhanced.lines().count(), outcome.execution.executed_jobs().len() + 1);
}
