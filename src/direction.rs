//! Random unit directions on the sphere.
//!
//! A direction is drawn as three independent standard normal samples,
//! normalized by their Euclidean length. The Gaussian is rotation invariant,
//! so the result is uniform on the unit sphere.
//!
//! Every batch worker owns its sampler. Samplers are seeded from
//! [`direction_key`], so a `(seed, iteration, batch)` triple always yields the
//! same directions no matter which thread runs it or in what order.

use crate::EPSILON;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// A unit vector in color space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction([f32; 3]);

impl Direction {
    /// Normalize `v`, or `None` if its length is too small (or not finite)
    /// to divide by.
    pub fn new(v: [f32; 3]) -> Option<Self> {
        let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if !norm.is_finite() || norm < EPSILON {
            return None;
        }
        Some(Self([v[0] / norm, v[1] / norm, v[2] / norm]))
    }

    /// Components of the unit vector.
    #[inline]
    pub fn components(&self) -> [f32; 3] {
        self.0
    }

    /// Dot product with a point.
    #[inline]
    pub fn project(&self, p: [f32; 3]) -> f32 {
        self.0[0] * p[0] + self.0[1] * p[1] + self.0[2] * p[2]
    }
}

/// Mix a job seed with an iteration and batch index into a 64-bit stream key.
///
/// SplitMix64 finalizer applied in sequence; neighboring `(iteration, batch)`
/// pairs land on unrelated keys.
pub fn direction_key(seed: u64, iteration: usize, batch: usize) -> u64 {
    let mut k = splitmix64(seed);
    k = splitmix64(k ^ iteration as u64);
    splitmix64(k ^ (batch as u64).rotate_left(32))
}

#[inline]
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Draws uniformly distributed directions from an owned random stream.
#[derive(Debug, Clone)]
pub struct DirectionSampler {
    rng: ChaCha8Rng,
}

impl DirectionSampler {
    /// Sampler over a stream seeded directly with `key`.
    pub fn from_key(key: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(key),
        }
    }

    /// Sampler for batch `batch` of iteration `iteration` in a job seeded with `seed`.
    pub fn keyed(seed: u64, iteration: usize, batch: usize) -> Self {
        Self::from_key(direction_key(seed, iteration, batch))
    }

    /// Sampler over a stream seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Draw one direction.
    ///
    /// Draws whose length is numerically zero are discarded and redrawn.
    pub fn sample(&mut self) -> Direction {
        loop {
            let v: [f32; 3] = [
                self.rng.sample(StandardNormal),
                self.rng.sample(StandardNormal),
                self.rng.sample(StandardNormal),
            ];
            if let Some(d) = Direction::new(v) {
                return d;
            }
        }
    }
}
