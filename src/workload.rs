//! workload.rs — units of work and the per-step session state machine.
//!
//! A `Workload` is either an independent `Job` (one query) or a
//! `UserSession` (a chain of dependent queries). One `execute` call runs
//! exactly one query. A session that still has steps left pushes itself
//! onto the continuation channel and hands control back to the worker, so
//! steps of different sessions interleave across workers while the steps of
//! one session stay strictly sequential.

use std::fmt;
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    client::SearchClient,
    collector::Collector,
    dataset::Vector,
    errors::LoadGenError,
    math,
};

/// A single k-NN query and, once executed, its measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// `J-{n}` for independent jobs, `S-{session}-{step}` inside sessions.
    pub id: String,
    pub query_vector: Vector,
    pub result_ids: Vec<i64>,
    pub latency: Duration,
    pub start_timestamp: Option<SystemTime>,
    /// Time between being queued and a worker picking it up.
    pub scheduling_delay: Duration,
}

impl Job {
    pub fn new(id: String, query_vector: Vector) -> Self {
        Self {
            id,
            query_vector,
            result_ids: Vec::new(),
            latency: Duration::ZERO,
            start_timestamp: None,
            scheduling_delay: Duration::ZERO,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_results(mut self, ids: Vec<i64>) -> Self {
        self.result_ids = ids;
        self
    }

    /// Run the query. Independent jobs never need the hits' vectors.
    pub async fn execute(mut self, ctx: &StepContext<'_>, scheduling_delay: Duration) -> Result<Job, LoadGenError> {
        if ctx.cancel.is_cancelled() {
            return Err(LoadGenError::Cancelled);
        }
        self.scheduling_delay = scheduling_delay;
        self.start_timestamp = Some(SystemTime::now());
        let started = Instant::now();
        let res = ctx.client.search(&self.query_vector, ctx.k, false, ctx.cancel).await;
        self.latency = started.elapsed();

        self.result_ids = res?.ids;
        ctx.collector.record_job(&self, None);
        Ok(self)
    }
}

/// Where a session ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    InProgress,
    Complete,
    /// The service returned no vector to derive the next query from.
    EndedEarly,
    Errored(String),
    Cancelled,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Complete => write!(f, "complete"),
            SessionStatus::EndedEarly => write!(f, "ended_early"),
            SessionStatus::Errored(_) => write!(f, "errored"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of finishing one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepTransition {
    Continue,
    Complete,
    EndedEarly,
}

/// A chain of dependent queries: each follow-up query is the previous top
/// hit plus a pre-sampled offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub session_id: u64,
    /// `jobs[0]` holds a real query; `jobs[i > 0]` hold offsets until step
    /// `i - 1` completes and overwrites them with the derived query.
    pub jobs: Vec<Job>,
    pub start_timestamp: Option<SystemTime>,
    pub duration: Duration,
    /// Sum of the scheduling delays of every executed step.
    pub scheduling_delay: Duration,
    pub status: SessionStatus,
    current_step: usize,
    #[serde(skip)]
    started: Option<Instant>,
}

impl UserSession {
    pub fn new(session_id: u64, jobs: Vec<Job>) -> Self {
        Self {
            session_id,
            jobs,
            start_timestamp: None,
            duration: Duration::ZERO,
            scheduling_delay: Duration::ZERO,
            status: SessionStatus::InProgress,
            current_step: 0,
            started: None,
        }
    }

    /// Index of the next step to run; equals `jobs.len()` once all ran.
    #[inline]
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Steps that actually produced results. Only these are graded.
    pub fn executed_jobs(&self) -> &[Job] {
        &self.jobs[..self.current_step]
    }

    /// Completes the current step and prepares the next query.
    pub(crate) fn complete_step(&mut self, top: Option<&[f32]>) -> StepTransition {
        self.current_step += 1;
        if self.current_step >= self.jobs.len() {
            self.finish(SessionStatus::Complete);
            return StepTransition::Complete;
        }
        let dims = self.jobs[self.current_step].query_vector.len();
        match top {
            Some(top) if top.len() == dims => {
                let next = &mut self.jobs[self.current_step];
                next.query_vector = next_query(top, &next.query_vector);
                StepTransition::Continue
            }
            _ => {
                self.finish(SessionStatus::EndedEarly);
                StepTransition::EndedEarly
            }
        }
    }

    fn finish(&mut self, status: SessionStatus) {
        self.duration = self.started.map(|s| s.elapsed()).unwrap_or_default();
        self.status = status;
    }

    /// Run the current step; see `Execution` for the possible outcomes.
    pub async fn execute(mut self, ctx: &StepContext<'_>, scheduling_delay: Duration) -> Execution {
        if ctx.cancel.is_cancelled() {
            debug!(
                session = self.session_id,
                step = self.current_step,
                steps = self.jobs.len(),
                "session cancelled before step"
            );
            if self.current_step == 0 {
                return Execution::Dropped(LoadGenError::Cancelled);
            }
            return self.terminate(ctx, SessionStatus::Cancelled, Some(LoadGenError::Cancelled));
        }

        if self.current_step >= self.jobs.len() {
            // Nothing left to run.
            self.finish(SessionStatus::Complete);
            return Execution::Terminal { work: Workload::Session(self), error: None };
        }

        self.scheduling_delay += scheduling_delay;
        if self.current_step == 0 {
            self.started = Some(Instant::now());
            self.start_timestamp = Some(SystemTime::now());
        }

        let step = self.current_step;
        let job = &mut self.jobs[step];
        job.scheduling_delay = scheduling_delay;
        job.start_timestamp = Some(SystemTime::now());
        let started = Instant::now();
        let res = ctx.client.search(&job.query_vector, ctx.k, true, ctx.cancel).await;
        job.latency = started.elapsed();

        let mut response = match res {
            Ok(r) => r,
            Err(e) => {
                let status = if e.is_cancelled() {
                    SessionStatus::Cancelled
                } else {
                    SessionStatus::Errored(e.to_string())
                };
                return self.terminate(ctx, status, Some(e));
            }
        };
        job.result_ids = std::mem::take(&mut response.ids);
        ctx.collector.record_job(&self.jobs[step], Some((self.session_id, step)));

        match self.complete_step(response.top_vector()) {
            StepTransition::Complete => {
                ctx.collector.record_session(&self);
                Execution::Terminal { work: Workload::Session(self), error: None }
            }
            StepTransition::EndedEarly => {
                warn!(
                    session = self.session_id,
                    step,
                    "no result vector to derive next query, ending session early"
                );
                ctx.collector.record_session(&self);
                Execution::Terminal { work: Workload::Session(self), error: None }
            }
            StepTransition::Continue => {
                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        self.terminate(ctx, SessionStatus::Cancelled, Some(LoadGenError::Cancelled))
                    }
                    permit = ctx.continuations.reserve() => match permit {
                        Ok(permit) => {
                            permit.send(self);
                            Execution::Continued
                        }
                        // Producer already gone: same as a cancelled push.
                        Err(_) => self.terminate(ctx, SessionStatus::Cancelled, Some(LoadGenError::Cancelled)),
                    },
                }
            }
        }
    }

    fn terminate(mut self, ctx: &StepContext<'_>, status: SessionStatus, error: Option<LoadGenError>) -> Execution {
        self.finish(status);
        ctx.collector.record_session(&self);
        Execution::Terminal { work: Workload::Session(self), error }
    }
}

/// Next session query: previous top hit shifted by the stored offset.
#[inline]
pub fn next_query(prior_top: &[f32], offset: &[f32]) -> Vector {
    math::add(prior_top, offset)
}

/// Independent jobs followed by the executed steps of every session, the
/// set the recall evaluator grades.
pub fn collect_executed_jobs(jobs: &[Job], sessions: &[UserSession]) -> Vec<Job> {
    jobs.iter()
        .chain(sessions.iter().flat_map(|s| s.executed_jobs()))
        .cloned()
        .collect()
}

/// Unit exchanged between the arrival controller and the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    Job(Job),
    Session(UserSession),
}

impl Workload {
    pub async fn execute(self, ctx: &StepContext<'_>, scheduling_delay: Duration) -> Execution {
        match self {
            Workload::Job(job) => match job.execute(ctx, scheduling_delay).await {
                Ok(job) => Execution::Terminal { work: Workload::Job(job), error: None },
                Err(e) => Execution::Dropped(e),
            },
            Workload::Session(session) => session.execute(ctx, scheduling_delay).await,
        }
    }
}

/// A workload stamped with the moment it entered the queue.
#[derive(Debug)]
pub struct TimedWorkload {
    pub work: Workload,
    pub scheduled_at: Instant,
}

impl TimedWorkload {
    pub fn now(work: Workload) -> Self {
        Self { work, scheduled_at: Instant::now() }
    }
}

/// Result of one `execute` call.
#[derive(Debug)]
pub enum Execution {
    /// The session queued its next step; nothing to collect yet.
    Continued,
    /// Finished (fully or partially). `error` is set for failed or cancelled sessions.
    Terminal { work: Workload, error: Option<LoadGenError> },
    /// Nothing worth collecting (failed or cancelled job, session cancelled before it began).
    Dropped(LoadGenError),
}

/// Everything a step needs from the engine.
pub struct StepContext<'a> {
    pub client: &'a dyn SearchClient,
    pub k: usize,
    pub cancel: &'a CancellationToken,
    pub continuations: &'a mpsc::Sender<UserSession>,
    pub collector: &'a dyn Collector,
}
