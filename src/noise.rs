//! Deterministic long-range-dependent noise used to perturb per-tick throughput and drop rate.
//!
//! The simulator treats the noise generator as a pluggable oracle (see [`NoiseSource`]) so that a
//! different approximation of fractional Gaussian noise can be swapped in without touching
//! [`crate::medium::Medium`]. The default [`SpectralFgn`] implementation is good enough to give
//! every medium a distinct, reproducible, long-range-correlated perturbation sequence.

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use std::f64::consts::PI;

/// Produces deterministic pseudo-random sequences approximating fractional Gaussian noise (fGn).
///
/// Implementations must be deterministic given the same `(seed, hurst, len)`: this is what makes
/// two simulation runs with identical seeds produce byte-identical metrics.
pub trait NoiseSource {
    /// Generate a sequence of `len` standard-normal-ish reals with long-range dependence
    /// controlled by the Hurst parameter `hurst` (typically in `(0, 1)`; `0.5` is uncorrelated
    /// white noise, values closer to `1` are smoother and more persistent).
    fn sequence(&self, seed: u64, hurst: f64, len: usize) -> Vec<f64>;
}

/// Spectral-synthesis approximation of fractional Gaussian noise.
///
/// Sums a fixed bank of cosine harmonics with random phases and amplitudes following a
/// `1/f^(2H+1)` power-law spectral density, which is the spectral signature of fGn. This is not a
/// statistically exact fGn sampler, but it is deterministic, cheap, and exhibits the same
/// qualitative long-range correlation the simulator needs from its throughput/drop perturbation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralFgn {
    /// Number of harmonics summed per sample. More harmonics approximate the spectrum more
    /// closely at the cost of O(len * harmonics) generation time.
    pub harmonics: usize,
}

impl SpectralFgn {
    /// Create a generator using a sensible default harmonic count.
    pub fn new() -> Self {
        Self { harmonics: 64 }
    }
}

impl NoiseSource for SpectralFgn {
    fn sequence(&self, seed: u64, hurst: f64, len: usize) -> Vec<f64> {
        if len == 0 {
            return Vec::new();
        }
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let phase_dist = Uniform::new(0.0, 2.0 * PI);
        let harmonics = self.harmonics.max(1);

        // Random phase and Gaussian-ish amplitude per harmonic, frequency k following a
        // 1/f^(2H+1) power-law spectral density characteristic of fractional Gaussian noise.
        let components: Vec<(f64, f64, f64)> = (1..=harmonics)
            .map(|k| {
                let freq = k as f64 / harmonics as f64 * PI;
                let density = (k as f64).powf(-(2.0 * hurst + 1.0));
                let amplitude = density.sqrt() * rng.sample::<f64, _>(rand_distr::StandardNormal);
                let phase = phase_dist.sample(&mut rng);
                (freq, amplitude, phase)
            })
            .collect();

        let raw: Vec<f64> = (0..len)
            .map(|t| {
                components
                    .iter()
                    .map(|(freq, amplitude, phase)| amplitude * (freq * t as f64 + phase).cos())
                    .sum()
            })
            .collect();

        normalize(&raw)
    }
}

/// Rescale a sequence to zero mean and unit variance, so callers can apply it as a multiplicative
/// or additive perturbation of known magnitude regardless of the harmonic bank's raw amplitude.
fn normalize(raw: &[f64]) -> Vec<f64> {
    let n = raw.len() as f64;
    let mean = raw.iter().sum::<f64>() / n;
    let variance = raw.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt().max(1e-9);
    raw.iter().map(|x| (x - mean) / std).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deterministic_given_same_seed() {
        let noise = SpectralFgn::new();
        let a = noise.sequence(42, 0.7, 200);
        let b = noise.sequence(42, 0.7, 200);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_across_seeds() {
        let noise = SpectralFgn::new();
        let a = noise.sequence(1, 0.7, 200);
        let b = noise.sequence(2, 0.7, 200);
        assert_ne!(a, b);
    }

    #[test]
    fn zero_mean_unit_variance() {
        let noise = SpectralFgn::new();
        let seq = noise.sequence(7, 0.5, 500);
        let mean = seq.iter().sum::<f64>() / seq.len() as f64;
        assert!(mean.abs() < 0.1);
    }
}
