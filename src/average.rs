//! Merging per-direction contributions into one iteration increment.
//!
//! Both policies compute the arithmetic mean. They differ in rounding:
//! [`Averaging::SumThenDivide`] accumulates then scales once and is
//! insensitive to merge order up to summation rounding;
//! [`Averaging::OnlineLerp`] keeps a running mean, updating
//! `acc = lerp(acc, c_k, 1 / (k + 1))`.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// How batch contributions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    /// `Σ c_k / B`.
    #[default]
    SumThenDivide,
    /// Incremental running mean starting from `c_0`.
    OnlineLerp,
}

impl Averaging {
    /// Combine `contributions` into `out`.
    ///
    /// `out` is overwritten. With no contributions it is zeroed.
    pub fn combine_into<'a, I>(self, contributions: I, out: &mut Array2<f32>)
    where
        I: IntoIterator<Item = ArrayView2<'a, f32>>,
    {
        let mut count = 0usize;
        for c in contributions {
            self.accumulate(out, count, &c);
            count += 1;
        }
        self.finish(out, count);
    }

    /// Fold contribution number `k` (zero-based) into `out`.
    ///
    /// Calling this for `k = 0, 1, ..` and then [`Averaging::finish`] gives
    /// the same bits as [`Averaging::combine_into`] over the same sequence,
    /// so contributions can be produced and merged a few at a time.
    pub fn accumulate(self, out: &mut Array2<f32>, k: usize, c: &ArrayView2<'_, f32>) {
        if k == 0 {
            out.assign(c);
            return;
        }
        match self {
            Averaging::SumThenDivide => *out += c,
            Averaging::OnlineLerp => {
                let t = 1.0 / (k + 1) as f32;
                out.zip_mut_with(c, |acc, &x| *acc += (x - *acc) * t);
            }
        }
    }

    /// Complete a fold of `count` contributions.
    pub fn finish(self, out: &mut Array2<f32>, count: usize) {
        if count == 0 {
            out.fill(0.0);
            return;
        }
        if self == Averaging::SumThenDivide && count > 1 {
            let inv = 1.0 / count as f32;
            out.mapv_inplace(|v| v * inv);
        }
    }

    /// Allocating form of [`Averaging::combine_into`].
    pub fn combine(self, contributions: &[Array2<f32>]) -> Array2<f32> {
        let shape = contributions
            .first()
            .map(|c| c.raw_dim())
            .unwrap_or_else(|| ndarray::Ix2(0, 3));
        let mut out = Array2::zeros(shape);
        self.combine_into(contributions.iter().map(|c| c.view()), &mut out);
        out
    }
}
