//! math.rs — distance kernel for exact ground-truth search.
//!
//! * Squared Euclidean only: the square root is monotonic, so ranking is
//!   unchanged without it.
//! * Optional AVX2 fast-path behind `--features simd` and
//!   `RUSTFLAGS="-C target-cpu=native"` on x86_64.

/// Squared L2 distance between two equally sized vectors (smaller = closer).
#[inline]
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let n = a.len().min(b.len());
    let mut dist = 0.0_f32;
    let mut i = 0usize;

    // ---------------- SIMD fast-path (AVX2) ----------------
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    unsafe {
        use std::arch::x86_64::*;
        if is_x86_feature_detected!("avx2") {
            while i + 8 <= n {
                let va = _mm256_loadu_ps(a.as_ptr().add(i));
                let vb = _mm256_loadu_ps(b.as_ptr().add(i));
                let diff = _mm256_sub_ps(va, vb);
                dist += _mm256_reduce_add_ps(_mm256_mul_ps(diff, diff));
                i += 8;
            }
        }
    }

    // ---------------- scalar tail (portable) ---------------
    while i < n {
        let diff = a[i] - b[i];
        dist += diff * diff;
        i += 1;
    }
    dist
}

/// AVX2 helper: horizontal sum of 8-lane register.
#[cfg(all(feature = "simd", target_arch = "x86_64"))]
#[inline]
unsafe fn _mm256_reduce_add_ps(v: std::arch::x86_64::__m256) -> f32 {
    use std::arch::x86_64::*;
    let hi = _mm256_extractf128_ps(v, 1);
    let lo = _mm256_castps256_ps128(v);
    let sum128 = _mm_add_ps(lo, hi);
    let hi64 = _mm_movehl_ps(sum128, sum128);
    let sum64 = _mm_add_ps(sum128, hi64);
    let shuf = _mm_movehdup_ps(sum64);
    let result = _mm_add_ss(sum64, shuf);
    _mm_cvtss_f32(result)
}

/// Element-wise `a + b` into a fresh vector.
#[inline]
pub fn add(a: &[f32], b: &[f32]) -> Vec<f32> {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}
