//! params.rs — builder for configuring a benchmark run.
//!
//! No `derive_builder`; setters are plain consuming methods and `build()`
//! validates everything once, before any concurrent work starts.

use std::time::Duration;

use crate::errors::{LoadGenError, Result};

/// Defaults from the reference deployment.
const DEF_WORKLOAD_STD_DEV: f32 = 7.5;
const DEF_WORKLOAD_MEAN: f32 = 0.0;
const DEF_FOLLOW_UP_STD_DEV: f32 = 0.15;
const DEF_FOLLOW_UP_MEAN: f32 = 1.25;
const DEF_MIN_SESSION_LEN: usize = 5;
const DEF_MAX_SESSION_LEN: usize = 50;
const DEF_TARGET_QPS: f64 = 100.0;
const DEF_DURATION: Duration = Duration::from_secs(30 * 60);
const DEF_JOB_PROBABILITY: f64 = 0.85;
const DEF_WORKERS: usize = 50;
const DEF_K: usize = 10;
const DEF_SEED: u64 = 3456;
const DEF_PUSH_TIMEOUT: Duration = Duration::from_secs(1);

const DEF_WARMUP_SEED: u64 = 420;
const DEF_WARMUP_WORKERS: usize = 7;
const DEF_WARMUP_MEAN: f32 = 100.0;
const DEF_WARMUP_STD_DEV: f32 = 10.0;

/// What the arrival process generates and how often.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadParams {
    pub workload_mean: f32,
    pub workload_std_dev: f32,
    pub follow_up_mean: f32,
    pub follow_up_std_dev: f32,
    pub min_session_length: usize,
    pub max_session_length: usize,
    /// Long-run arrival rate of the Poisson process.
    pub target_qps: f64,
    /// Probability of an independent job rather than a session.
    pub job_probability: f64,
}

impl WorkloadParams {
    /// Checks shared by `BenchmarkBuilder::build` and `ArrivalController::new`.
    pub fn validate(&self) -> Result<()> {
        if !(self.target_qps.is_finite() && self.target_qps > 0.0) {
            return Err(invalid(format!("target_qps must be positive, got {}", self.target_qps)));
        }
        if !(0.0..=1.0).contains(&self.job_probability) {
            return Err(invalid(format!(
                "job_probability must be within [0, 1], got {}",
                self.job_probability
            )));
        }
        if self.min_session_length == 0 || self.min_session_length > self.max_session_length {
            return Err(invalid(format!(
                "session length range {}..={} is empty",
                self.min_session_length, self.max_session_length
            )));
        }
        for (name, sd) in [
            ("workload_std_dev", self.workload_std_dev),
            ("follow_up_std_dev", self.follow_up_std_dev),
        ] {
            if !(sd.is_finite() && sd >= 0.0) {
                return Err(invalid(format!("{} must be a finite non-negative number", name)));
            }
        }
        Ok(())
    }
}

impl Default for WorkloadParams {
    fn default() -> Self {
        Self {
            workload_mean: DEF_WORKLOAD_MEAN,
            workload_std_dev: DEF_WORKLOAD_STD_DEV,
            follow_up_mean: DEF_FOLLOW_UP_MEAN,
            follow_up_std_dev: DEF_FOLLOW_UP_STD_DEV,
            min_session_length: DEF_MIN_SESSION_LEN,
            max_session_length: DEF_MAX_SESSION_LEN,
            target_qps: DEF_TARGET_QPS,
            job_probability: DEF_JOB_PROBABILITY,
        }
    }
}

/// Closed-loop warmup before the measured phase. `queries == 0` skips it.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmupParams {
    pub queries: usize,
    pub workers: usize,
    pub mean: f32,
    pub std_dev: f32,
    pub seed: u64,
}

impl Default for WarmupParams {
    fn default() -> Self {
        Self {
            queries: 0,
            workers: DEF_WARMUP_WORKERS,
            mean: DEF_WARMUP_MEAN,
            std_dev: DEF_WARMUP_STD_DEV,
            seed: DEF_WARMUP_SEED,
        }
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    pub dims: usize,
    pub workload: WorkloadParams,
    pub duration: Duration,
    pub workers: usize,
    /// Result-set size requested from the SUT.
    pub k: usize,
    pub seed: u64,
    /// Grace period for a queue push before the unit is shed.
    pub push_timeout: Duration,
    pub continuation_capacity: usize,
    pub warmup: WarmupParams,
}

impl BenchmarkConfig {
    /// Work queue capacity: twice the worker count.
    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.workers * 2
    }
}

/// Builder pattern for `BenchmarkConfig`.
#[derive(Debug, Clone)]
pub struct BenchmarkBuilder {
    dims: Option<usize>,
    workload: WorkloadParams,
    duration: Duration,
    workers: usize,
    k: usize,
    seed: u64,
    push_timeout: Duration,
    continuation_capacity: Option<usize>,
    warmup: WarmupParams,
}

impl Default for BenchmarkBuilder {
    fn default() -> Self {
        Self {
            dims: None,
            workload: WorkloadParams::default(),
            duration: DEF_DURATION,
            workers: DEF_WORKERS,
            k: DEF_K,
            seed: DEF_SEED,
            push_timeout: DEF_PUSH_TIMEOUT,
            continuation_capacity: None,
            warmup: WarmupParams::default(),
        }
    }
}

impl BenchmarkBuilder {
    /// Set dimensionality (required).
    pub fn dims(mut self, d: usize) -> Self {
        self.dims = Some(d);
        self
    }

    pub fn target_qps(mut self, qps: f64) -> Self {
        self.workload.target_qps = qps;
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn job_probability(mut self, p: f64) -> Self {
        self.workload.job_probability = p;
        self
    }

    /// Inclusive bounds for the number of steps in a session.
    pub fn session_length(mut self, min: usize, max: usize) -> Self {
        self.workload.min_session_length = min;
        self.workload.max_session_length = max;
        self
    }

    /// Distribution of independent queries and first session steps.
    pub fn workload_distribution(mut self, mean: f32, std_dev: f32) -> Self {
        self.workload.workload_mean = mean;
        self.workload.workload_std_dev = std_dev;
        self
    }

    /// Distribution of the offsets added to a session's previous top hit.
    pub fn follow_up_distribution(mut self, mean: f32, std_dev: f32) -> Self {
        self.workload.follow_up_mean = mean;
        self.workload.follow_up_std_dev = std_dev;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    /// Capacity of the session continuation channel (defaults to `workers`).
    pub fn continuation_capacity(mut self, n: usize) -> Self {
        self.continuation_capacity = Some(n);
        self
    }

    pub fn warmup(mut self, warmup: WarmupParams) -> Self {
        self.warmup = warmup;
        self
    }

    /// Finish and obtain a validated `BenchmarkConfig`.
    pub fn build(self) -> Result<BenchmarkConfig> {
        let dims = match self.dims {
            Some(d) if d > 0 => d,
            _ => return Err(invalid("dims must be set and non-zero")),
        };
        self.workload.validate()?;
        if !(self.warmup.std_dev.is_finite() && self.warmup.std_dev >= 0.0) {
            return Err(invalid("warmup std_dev must be a finite non-negative number"));
        }
        if self.workers == 0 {
            return Err(invalid("workers must be non-zero"));
        }
        if self.k == 0 {
            return Err(invalid("k must be non-zero"));
        }
        if self.duration.is_zero() {
            return Err(invalid("duration must be non-zero"));
        }
        if self.warmup.queries > 0 && self.warmup.workers == 0 {
            return Err(invalid("warmup workers must be non-zero"));
        }

        let continuation_capacity = self.continuation_capacity.unwrap_or(self.workers).max(1);
        Ok(BenchmarkConfig {
            dims,
            workload: self.workload,
            duration: self.duration,
            workers: self.workers,
            k: self.k,
            seed: self.seed,
            push_timeout: self.push_timeout,
            continuation_capacity,
            warmup: self.warmup,
        })
    }
}

fn invalid(msg: impl Into<String>) -> LoadGenError {
    LoadGenError::InvalidConfig(msg.into())
}
