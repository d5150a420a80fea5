//! collector.rs — where per-job, per-session and graded records end up.
//!
//! The engine calls the collector from worker tasks, so implementations
//! must be cheap and thread-safe. Write failures are logged, never
//! propagated into the run.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::warn;

use crate::{
    errors::Result,
    recall::EnhancedJobResult,
    workload::{Job, UserSession},
};

/// File name of the graded output inside a run directory.
pub const ENHANCED_RESULTS_FILE: &str = "enhanced-results.csv";

/// Sink for execution records.
pub trait Collector: Send + Sync {
    /// `session` is `(session_id, step)` for session steps, `None` for independent jobs.
    fn record_job(&self, job: &Job, session: Option<(u64, usize)>);

    fn record_session(&self, session: &UserSession);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCollector;

impl Collector for NullCollector {
    fn record_job(&self, _job: &Job, _session: Option<(u64, usize)>) {}
    fn record_session(&self, _session: &UserSession) {}
}

/// Keeps records in memory; handy for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCollector {
    jobs: Mutex<Vec<(Job, Option<(u64, usize)>)>>,
    sessions: Mutex<Vec<UserSession>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<(Job, Option<(u64, usize)>)> {
        self.jobs.lock().map(|j| j.clone()).unwrap_or_default()
    }

    pub fn sessions(&self) -> Vec<UserSession> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Collector for MemoryCollector {
    fn record_job(&self, job: &Job, session: Option<(u64, usize)>) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push((job.clone(), session));
        }
    }

    fn record_session(&self, session: &UserSession) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(session.clone());
        }
    }
}

#[derive(Serialize)]
struct JobRecord<'a> {
    timestamp_us: u64,
    job_id: &'a str,
    is_session: bool,
    session_id: i64,
    step: i64,
    query_vector: String,
    result_ids: String,
    latency_us: u64,
    scheduling_delay_us: u64,
}

impl<'a> JobRecord<'a> {
    fn new(job: &'a Job, session: Option<(u64, usize)>) -> Self {
        let (session_id, step) = match session {
            Some((sid, step)) => (sid as i64, step as i64),
            None => (-1, -1),
        };
        Self {
            timestamp_us: unix_micros(job.start_timestamp),
            job_id: &job.id,
            is_session: session.is_some(),
            session_id,
            step,
            query_vector: render_list(&job.query_vector),
            result_ids: render_list(&job.result_ids),
            latency_us: micros(job.latency),
            scheduling_delay_us: micros(job.scheduling_delay),
        }
    }
}

#[derive(Serialize)]
struct SessionRecord {
    timestamp_us: u64,
    session_id: u64,
    steps: usize,
    total_duration_us: u64,
    scheduling_delay_us: u64,
    status: String,
}

#[derive(Serialize)]
struct EnhancedRecord<'a> {
    timestamp_us: u64,
    job_id: &'a str,
    query_vector: String,
    result_ids: String,
    latency_us: u64,
    scheduling_delay_us: u64,
    recall: f64,
}

/// CSV files in an explicit output directory:
/// `{prefix}-jobs.csv` and `{prefix}-sessions.csv`.
pub struct CsvCollector {
    dir: PathBuf,
    jobs: Mutex<csv::Writer<File>>,
    sessions: Mutex<csv::Writer<File>>,
}

impl CsvCollector {
    pub fn create(dir: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let jobs = csv::Writer::from_path(dir.join(format!("{}-jobs.csv", prefix)))?;
        let sessions = csv::Writer::from_path(dir.join(format!("{}-sessions.csv", prefix)))?;
        Ok(Self { dir, jobs: Mutex::new(jobs), sessions: Mutex::new(sessions) })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn flush(&self) -> Result<()> {
        if let Ok(mut w) = self.jobs.lock() {
            w.flush()?;
        }
        if let Ok(mut w) = self.sessions.lock() {
            w.flush()?;
        }
        Ok(())
    }

    /// Write graded results next to the run's other files.
    pub fn write_enhanced_results(&self, results: &[EnhancedJobResult]) -> Result<PathBuf> {
        write_enhanced_results(&self.dir, results)
    }
}

impl Collector for CsvCollector {
    fn record_job(&self, job: &Job, session: Option<(u64, usize)>) {
        if let Ok(mut w) = self.jobs.lock() {
            if let Err(e) = w.serialize(JobRecord::new(job, session)) {
                warn!(job = %job.id, error = %e, "failed to write job record");
            }
        }
    }

    fn record_session(&self, session: &UserSession) {
        let record = SessionRecord {
            timestamp_us: unix_micros(session.start_timestamp),
            session_id: session.session_id,
            steps: session.jobs.len(),
            total_duration_us: micros(session.duration),
            scheduling_delay_us: micros(session.scheduling_delay),
            status: session.status.to_string(),
        };
        if let Ok(mut w) = self.sessions.lock() {
            if let Err(e) = w.serialize(record) {
                warn!(session = session.session_id, error = %e, "failed to write session record");
            }
        }
    }
}

impl Drop for CsvCollector {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush collector");
        }
    }
}

/// Write `enhanced-results.csv` into `dir`, returning its path.
pub fn write_enhanced_results(dir: &Path, results: &[EnhancedJobResult]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(ENHANCED_RESULTS_FILE);
    let mut w = csv::Writer::from_path(&path)?;
    for r in results {
        w.serialize(EnhancedRecord {
            timestamp_us: unix_micros(r.job.start_timestamp),
            job_id: &r.job.id,
            query_vector: render_list(&r.job.query_vector),
            result_ids: render_list(&r.job.result_ids),
            latency_us: micros(r.job.latency),
            scheduling_delay_us: micros(r.job.scheduling_delay),
            recall: r.recall,
        })?;
    }
    w.flush()?;
    Ok(path)
}

/// `[a b c]`
fn render_list<T: std::fmt::Display>(items: &[T]) -> String {
    let body: Vec<String> = items.iter().map(ToString::to_string).collect();
    format!("[{}]", body.join(" "))
}

#[inline]
fn micros(d: Duration) -> u64 {
    d.as_micros().min(u64::MAX as u128) as u64
}

fn unix_micros(t: Option<SystemTime>) -> u64 {
    t.and_then(|t| t.duration_since(UNIX_EPOCH).ok()).map(micros).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::SessionStatus;

    fn executed_job(id: &str) -> Job {
        let mut j = Job::new(id.to_string(), vec![0.5, -1.0]);
        j.result_ids = vec![3, 1];
        j.latency = Duration::from_micros(1500);
        j.scheduling_delay = Duration::from_micros(20);
        j.start_timestamp = Some(UNIX_EPOCH + Duration::from_secs(1));
        j
    }

    #[test]
    fn renders_bracketed_lists() {
        assert_eq!(render_list(&[1, 2, 3]), "[1 2 3]");
        assert_eq!(render_list::<i64>(&[]), "[]");
        assert_eq!(render_list(&[0.5_f32, -1.0]), "[0.5 -1]");
    }

    #[test]
    fn csv_collector_writes_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let c = CsvCollector::create(dir.path(), "benchmark").unwrap();
        c.record_job(&executed_job("J-0"), None);
        c.record_job(&executed_job("S-4-1"), Some((4, 1)));

        let mut s = UserSession::new(4, vec![executed_job("S-4-0"), executed_job("S-4-1")]);
        s.status = SessionStatus::Complete;
        s.duration = Duration::from_millis(3);
        c.record_session(&s);
        c.flush().unwrap();

        let jobs = fs::read_to_string(dir.path().join("benchmark-jobs.csv")).unwrap();
        let mut lines = jobs.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp_us,job_id,is_session,session_id,step,query_vector,result_ids,latency_us,scheduling_delay_us"
        );
        assert_eq!(lines.next().unwrap(), "1000000,J-0,false,-1,-1,[0.5 -1],[3 1],1500,20");
        assert_eq!(lines.next().unwrap(), "1000000,S-4-1,true,4,1,[0.5 -1],[3 1],1500,20");

        let sessions = fs::read_to_string(dir.path().join("benchmark-sessions.csv")).unwrap();
        assert!(sessions.starts_with("timestamp_us,session_id,steps,total_duration_us,scheduling_delay_us,status"));
        assert!(sessions.contains(",4,2,3000,0,complete"));
    }

    #[test]
    fn enhanced_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![EnhancedJobResult { job: executed_job("J-7"), recall: 0.5 }];
        let path = write_enhanced_results(dir.path(), &results).unwrap();
        assert_eq!(path.file_name().unwrap(), ENHANCED_RESULTS_FILE);
        let body = fs::read_to_string(path).unwrap();
        assert!(body.lines().nth(1).unwrap().ends_with(",0.5"));
    }

    #[test]
    fn memory_collector_keeps_everything() {
        let c = MemoryCollector::new();
        c.record_job(&executed_job("J-0"), None);
        c.record_session(&UserSession::new(1, vec![]));
        assert_eq!(c.jobs().len(), 1);
        assert_eq!(c.sessions()[0].session_id, 1);
    }
}
