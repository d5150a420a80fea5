//! warmup.rs — closed-loop warmup before the measured run.
//!
//! A fixed batch of random queries goes through a small worker pool as
//! fast as the service answers. Nothing is timed or collected; failures are
//! logged and counted but never abort the run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{client::SearchClient, params::WarmupParams, vecgen::generate_query_vectors};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Queries handed to a worker.
    pub executed: usize,
    pub failed: usize,
}

pub async fn run_warmup(client: Arc<dyn SearchClient>, params: &WarmupParams, dims: usize, k: usize) -> WarmupReport {
    if params.queries == 0 {
        return WarmupReport::default();
    }
    info!(queries = params.queries, workers = params.workers, "warming up");

    let mut rng = StdRng::seed_from_u64(params.seed);
    let queries = generate_query_vectors(&mut rng, dims, params.queries, params.mean, params.std_dev);

    let workers_n = params.workers.max(1);
    let (tx, rx) = async_channel::bounded::<Vec<f32>>(workers_n * 2);
    let failed = Arc::new(AtomicUsize::new(0));
    // Warmup is never cut short.
    let cancel = CancellationToken::new();

    let mut workers = JoinSet::new();
    for worker_id in 0..workers_n {
        let rx = rx.clone();
        let client = client.clone();
        let failed = failed.clone();
        let cancel = cancel.clone();
        workers.spawn(async move {
            while let Ok(query) = rx.recv().await {
                if let Err(e) = client.search(&query, k, false, &cancel).await {
                    warn!(worker = worker_id, error = %e, "warmup query failed");
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
        });
    }
    drop(rx);

    let mut sent = 0usize;
    for query in queries {
        if tx.send(query).await.is_err() {
            warn!(sent, queries = params.queries, "all warmup workers gone, stopping early");
            break;
        }
        sent += 1;
    }
    tx.close();

    while let Some(res) = workers.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "warmup worker failed");
        }
    }

    let report = WarmupReport { executed: sent, failed: failed.load(Ordering::Relaxed) };
    info!(executed = report.executed, failed = report.failed, "warmup completed");
    report
}
