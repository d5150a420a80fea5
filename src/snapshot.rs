//! (feature = "snapshot") JSON run snapshots for offline recall.
//!
//! A run directory holds the dataset (`data-rows.json`) and everything the
//! engine returned (`jobs-sessions.json`). Grading can then happen later,
//! on another machine, without touching the service again.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use crate::{
    collector::write_enhanced_results,
    dataset::DataRow,
    errors::Result,
    recall::{enhance_job_results, RecallSummary},
    workload::{collect_executed_jobs, Job, UserSession},
};

pub const DATA_ROWS_FILE: &str = "data-rows.json";
pub const JOBS_SESSIONS_FILE: &str = "jobs-sessions.json";

/// Terminal jobs and sessions of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub jobs: Vec<Job>,
    pub sessions: Vec<UserSession>,
}

impl RunSnapshot {
    pub fn executed_jobs(&self) -> Vec<Job> {
        collect_executed_jobs(&self.jobs, &self.sessions)
    }
}

pub fn write_data_rows(dir: &Path, rows: &[DataRow]) -> Result<PathBuf> {
    write_json(dir, DATA_ROWS_FILE, &rows)
}

pub fn read_data_rows(dir: &Path) -> Result<Vec<DataRow>> {
    read_json(&dir.join(DATA_ROWS_FILE))
}

pub fn write_run(dir: &Path, run: &RunSnapshot) -> Result<PathBuf> {
    write_json(dir, JOBS_SESSIONS_FILE, run)
}

pub fn read_run(dir: &Path) -> Result<RunSnapshot> {
    read_json(&dir.join(JOBS_SESSIONS_FILE))
}

/// Grade a snapshotted run and write `enhanced-results.csv` next to it.
pub fn recompute_recall(dir: &Path) -> Result<(PathBuf, Option<RecallSummary>)> {
    let rows = read_data_rows(dir)?;
    let run = read_run(dir)?;
    let jobs = run.executed_jobs();
    info!(dir = %dir.display(), rows = rows.len(), jobs = jobs.len(), "computing recall");

    let results = enhance_job_results(&rows, &jobs)?;
    let path = write_enhanced_results(dir, &results)?;
    Ok((path, RecallSummary::from_results(&results)))
}

fn write_json<T: Serialize + ?Sized>(dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    let mut w = BufWriter::new(File::create(&path)?);
    serde_json::to_writer(&mut w, value)?;
    w.flush()?;
    Ok(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let r = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(r)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ENHANCED_RESULTS_FILE;
    use crate::errors::LoadGenError;

    fn rows() -> Vec<DataRow> {
        vec![
            DataRow::new(1, vec![1.0, 0.0], "a"),
            DataRow::new(2, vec![2.0, 0.0], "b"),
            DataRow::new(3, vec![3.0, 0.0], "c"),
        ]
    }

    #[test]
    fn snapshot_survives_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = UserSession::new(3, vec![Job::new("S-3-0".into(), vec![0.0, 0.0])]);
        session.complete_step(None);
        let run = RunSnapshot { jobs: vec![Job::new("J-0".into(), vec![0.5, 0.0])], sessions: vec![session] };

        write_data_rows(dir.path(), &rows()).unwrap();
        write_run(dir.path(), &run).unwrap();

        assert_eq!(read_data_rows(dir.path()).unwrap(), rows());
        let back = read_run(dir.path()).unwrap();
        assert_eq!(back.sessions[0].current_step(), 1);
        assert_eq!(back.executed_jobs().len(), 2);
    }

    #[test]
    fn recompute_grades_only_executed_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut j = Job::new("J-0".into(), vec![0.0, 0.0]);
        j.result_ids = vec![1, 3];
        let mut s0 = Job::new("S-0-0".into(), vec![2.9, 0.0]);
        s0.result_ids = vec![3];
        let mut session = UserSession::new(0, vec![s0, Job::new("S-0-1".into(), vec![0.1, 0.1])]);
        session.complete_step(None);

        write_data_rows(dir.path(), &rows()).unwrap();
        write_run(dir.path(), &RunSnapshot { jobs: vec![j], sessions: vec![session] }).unwrap();

        let (path, summary) = recompute_recall(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(ENHANCED_RESULTS_FILE));
        let summary = summary.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.min, 0.5);
        assert_eq!(summary.mean, 0.75);
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(read_run(dir.path()), Err(LoadGenError::Io(_))));
    }
}
