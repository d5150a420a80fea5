//! engine.rs — partly-open execution: timed arrivals feed a fixed worker pool.
//!
//! One producer task sleeps for Poisson gaps and pushes work into a bounded
//! queue (capacity 2x workers); pending session continuations win over fresh
//! arrivals. Workers pull, execute one step, and collect terminal results.
//!
//! Shutdown: when the duration elapses the producer fires the shared
//! cancellation token and closes the queue. Workers drain what is queued
//! (those items observe the cancellation) and exit; `execute_workload`
//! returns once every worker is done. Sessions still parked in the
//! continuation channel at that point are abandoned: they are counted and
//! logged but never finished or collected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    arrival::ArrivalController,
    client::SearchClient,
    collector::Collector,
    params::BenchmarkConfig,
    workload::{collect_executed_jobs, Execution, Job, StepContext, TimedWorkload, UserSession, Workload},
};

/// Everything that finished (fully or partially) before the drain ended.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub jobs: Vec<Job>,
    pub sessions: Vec<UserSession>,
    /// Arrivals shed because the queue stayed full past the grace period.
    pub dropped: usize,
    /// Sessions left in the continuation channel at shutdown.
    pub abandoned_sessions: usize,
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// Independent jobs followed by the executed steps of every session.
    pub fn executed_jobs(&self) -> Vec<Job> {
        collect_executed_jobs(&self.jobs, &self.sessions)
    }
}

#[derive(Default)]
struct Results {
    jobs: Vec<Job>,
    sessions: Vec<UserSession>,
}

/// Terminal results, appended by workers under one lock.
#[derive(Default)]
struct SharedResults(Mutex<Results>);

impl SharedResults {
    fn lock(&self) -> MutexGuard<'_, Results> {
        // A panicked sibling worker must not cost us the other results.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, work: Workload) {
        let mut r = self.lock();
        match work {
            Workload::Job(job) => r.jobs.push(job),
            Workload::Session(session) => r.sessions.push(session),
        }
    }

    fn take(&self) -> Results {
        std::mem::take(&mut *self.lock())
    }
}

struct ProducerStats {
    dropped: usize,
    abandoned_sessions: usize,
}

/// Run the workload for `config.duration` on `config.workers` workers.
pub async fn execute_workload(
    controller: ArrivalController,
    client: Arc<dyn SearchClient>,
    collector: Arc<dyn Collector>,
    config: &BenchmarkConfig,
) -> ExecutionReport {
    let started = Instant::now();
    let (work_tx, work_rx) = async_channel::bounded::<TimedWorkload>(config.queue_capacity());
    let (cont_tx, cont_rx) = mpsc::channel::<UserSession>(config.continuation_capacity);
    let cancel = CancellationToken::new();
    let results = Arc::new(SharedResults::default());

    info!(
        target_qps = controller.params().target_qps,
        duration = ?config.duration,
        job_probability = controller.params().job_probability,
        workers = config.workers,
        "starting benchmark with poisson arrivals"
    );

    let mut workers = JoinSet::new();
    for worker_id in 0..config.workers {
        let rx = work_rx.clone();
        let client = client.clone();
        let collector = collector.clone();
        let cancel = cancel.clone();
        let continuations = cont_tx.clone();
        let results = results.clone();
        let k = config.k;

        workers.spawn(async move {
            while let Ok(timed) = rx.recv().await {
                let scheduling_delay = timed.scheduled_at.elapsed();
                let ctx = StepContext {
                    client: client.as_ref(),
                    k,
                    cancel: &cancel,
                    continuations: &continuations,
                    collector: collector.as_ref(),
                };

                match timed.work.execute(&ctx, scheduling_delay).await {
                    Execution::Continued => {}
                    Execution::Terminal { work, error } => {
                        match &error {
                            Some(e) if e.is_cancelled() => {
                                debug!(worker = worker_id, "session cut short by cancellation")
                            }
                            Some(e) => warn!(worker = worker_id, error = %e, "session step failed, keeping partial session"),
                            None => {}
                        }
                        results.push(work);
                    }
                    Execution::Dropped(e) if e.is_cancelled() => {
                        debug!(worker = worker_id, "work cancelled")
                    }
                    Execution::Dropped(e) => {
                        warn!(worker = worker_id, error = %e, "error executing work, dropping it")
                    }
                }
            }
        });
    }
    // Workers hold the only remaining handles.
    drop(work_rx);
    drop(cont_tx);

    let producer = tokio::spawn(produce(
        controller,
        work_tx,
        cont_rx,
        cancel,
        config.duration,
        config.push_timeout,
    ));
    let stats = match producer.await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "arrival task failed");
            ProducerStats { dropped: 0, abandoned_sessions: 0 }
        }
    };

    while let Some(res) = workers.join_next().await {
        if let Err(e) = res {
            warn!(error = %e, "worker task failed");
        }
    }

    let Results { jobs, sessions } = results.take();

    let report = ExecutionReport {
        jobs,
        sessions,
        dropped: stats.dropped,
        abandoned_sessions: stats.abandoned_sessions,
        elapsed: started.elapsed(),
    };
    info!(
        jobs = report.jobs.len(),
        sessions = report.sessions.len(),
        dropped = report.dropped,
        abandoned_sessions = report.abandoned_sessions,
        "executed workload"
    );
    report
}

/// Arrival loop. Owns the controller, the queue sender and the
/// continuation receiver.
async fn produce(
    mut controller: ArrivalController,
    work_tx: async_channel::Sender<TimedWorkload>,
    mut continuations: mpsc::Receiver<UserSession>,
    cancel: CancellationToken,
    duration: Duration,
    push_timeout: Duration,
) -> ProducerStats {
    let start = Instant::now();
    let mut dropped = 0usize;

    loop {
        // A gap past the deadline ends the run at the deadline.
        let remaining = duration.saturating_sub(start.elapsed());
        tokio::time::sleep(controller.next_sleep_duration().min(remaining)).await;

        if start.elapsed() >= duration {
            info!("benchmark duration reached, stopping arrivals");
            cancel.cancel();
            break;
        }

        // Continuations first, so in-flight sessions finish sooner.
        let work = match continuations.try_recv() {
            Ok(session) => Workload::Session(session),
            Err(_) => controller.generate_workload(),
        };

        match tokio::time::timeout(push_timeout, work_tx.send(TimedWorkload::now(work))).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                warn!("work queue closed, stopping arrivals");
                cancel.cancel();
                break;
            }
            Err(_) => {
                dropped += 1;
                warn!(timeout = ?push_timeout, "work queue full, dropping workload");
            }
        }
    }

    // Queued items are still delivered after close.
    work_tx.close();
    continuations.close();
    let mut abandoned_sessions = 0usize;
    while continuations.try_recv().is_ok() {
        abandoned_sessions += 1;
    }
    if abandoned_sessions > 0 {
        warn!(abandoned_sessions, "sessions left waiting for continuation at shutdown");
    }
    ProducerStats { dropped, abandoned_sessions }
}
