//! arrival.rs — Poisson arrivals and workload generation.
//!
//! The controller is the single writer of the run's random source and id
//! counters, so a fixed seed reproduces the exact same arrival schedule and
//! the exact same queries.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    errors::Result,
    params::WorkloadParams,
    vecgen::generate_vector,
    workload::{Job, UserSession, Workload},
};

pub struct ArrivalController {
    params: WorkloadParams,
    dims: usize,
    rng: StdRng,
    job_counter: u64,
    session_counter: u64,
}

impl ArrivalController {
    pub fn new(params: WorkloadParams, dims: usize, seed: u64) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            dims,
            rng: StdRng::seed_from_u64(seed),
            job_counter: 0,
            session_counter: 0,
        })
    }

    #[inline]
    pub fn params(&self) -> &WorkloadParams {
        &self.params
    }

    /// Exponential inter-arrival time with rate `target_qps`: `-ln(U) / qps`.
    /// Gaps too large for `Duration` saturate to `Duration::MAX`.
    pub fn next_sleep_duration(&mut self) -> Duration {
        // gen::<f64>() is in [0, 1); resample the singular zero.
        let mut u: f64 = self.rng.gen();
        while u == 0.0 {
            u = self.rng.gen();
        }
        Duration::try_from_secs_f64(-u.ln() / self.params.target_qps).unwrap_or(Duration::MAX)
    }

    /// Independent job with probability `job_probability`, otherwise a session.
    pub fn generate_workload(&mut self) -> Workload {
        if self.rng.gen::<f64>() < self.params.job_probability {
            Workload::Job(self.generate_job())
        } else {
            Workload::Session(self.generate_session())
        }
    }

    fn generate_job(&mut self) -> Job {
        let query = generate_vector(
            &mut self.rng,
            self.dims,
            self.params.workload_mean,
            self.params.workload_std_dev,
        );
        let id = format!("J-{}", self.job_counter);
        self.job_counter += 1;
        Job::new(id, query)
    }

    fn generate_session(&mut self) -> UserSession {
        let p = &self.params;
        let len = self.rng.gen_range(p.min_session_length..=p.max_session_length);
        let sid = self.session_counter;
        self.session_counter += 1;

        let jobs = (0..len)
            .map(|step| {
                // Only the first step is a query; the rest are offsets.
                let (mean, std_dev) = if step == 0 {
                    (p.workload_mean, p.workload_std_dev)
                } else {
                    (p.follow_up_mean, p.follow_up_std_dev)
                };
                let v = generate_vector(&mut self.rng, self.dims, mean, std_dev);
                Job::new(format!("S-{}-{}", sid, step), v)
            })
            .collect();
        UserSession::new(sid, jobs)
    }
}
