//! vecgen.rs — Gaussian query vectors from a caller-owned random source.
//!
//! Every component is drawn independently as `N(0, 1) * std_dev + mean`.
//! The generator never owns an RNG, so a single seeded source can drive a
//! whole run and stay reproducible.
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let v = knn_loadgen::generate_vector(&mut rng, 16, 0.0, 1.0);
//! assert_eq!(v.len(), 16);
//! ```

use rand::Rng;
use rand_distr::StandardNormal;

use crate::dataset::Vector;

#[inline]
pub fn generate_vector<R: Rng + ?Sized>(rng: &mut R, dims: usize, mean: f32, std_dev: f32) -> Vector {
    (0..dims)
        .map(|_| {
            let z: f32 = rng.sample(StandardNormal);
            z * std_dev + mean
        })
        .collect()
}

/// Batch helper used by the warmup phase.
pub fn generate_query_vectors<R: Rng + ?Sized>(
    rng: &mut R,
    dims: usize,
    count: usize,
    mean: f32,
    std_dev: f32,
) -> Vec<Vector> {
    (0..count)
        .map(|_| generate_vector(rng, dims, mean, std_dev))
        .collect()
}
