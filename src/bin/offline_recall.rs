//! Recompute recall for every run directory under a base path.
//!
//! Each subdirectory must hold `data-rows.json` and `jobs-sessions.json`;
//! `enhanced-results.csv` is written next to them. A directory that fails
//! is logged and skipped.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use knn_loadgen::snapshot::recompute_recall;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "offline-recall")]
#[command(about = "Grade snapshotted benchmark runs against exact k-NN", long_about = None)]
struct Cli {
    /// Directory whose subdirectories are run directories
    base_path: PathBuf,
}

fn main() -> knn_loadgen::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut graded = 0usize;
    for entry in fs::read_dir(&cli.base_path)? {
        let dir = entry?.path();
        if !dir.is_dir() {
            continue;
        }
        match recompute_recall(&dir) {
            Ok((path, Some(s))) => {
                graded += 1;
                info!(
                    path = %path.display(),
                    jobs = s.count,
                    mean = s.mean,
                    p50 = s.p50,
                    p95 = s.p95,
                    "wrote enhanced results"
                );
            }
            Ok((path, None)) => {
                graded += 1;
                info!(path = %path.display(), "no executed jobs in run");
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "skipping run directory"),
        }
    }
    info!(graded, "offline recall finished");
    Ok(())
}
