//! Color point clouds and displacement fields.
//!
//! Both types are `N × 3` arrays: one row per pixel (row-major pixel order
//! fixed at decode time), one column per channel. Values are not clamped;
//! extrapolated blends may leave `[0, 255]` and only the encoder clamps.

use crate::{Error, Result};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Number of channels per point.
pub const CHANNELS: usize = 3;

/// An ordered collection of 3-dimensional color points.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPointCloud {
    points: Array2<f32>,
}

impl ColorPointCloud {
    /// Wrap an `N × 3` array.
    pub fn new(points: Array2<f32>) -> Result<Self> {
        if points.ncols() != CHANNELS {
            return Err(Error::ChannelCount(points.ncols()));
        }
        Ok(Self { points })
    }

    /// Build a cloud from a slice of RGB triples.
    pub fn from_points(points: &[[f32; 3]]) -> Self {
        let mut arr = Array2::zeros((points.len(), CHANNELS));
        for (mut row, p) in arr.outer_iter_mut().zip(points) {
            row[0] = p[0];
            row[1] = p[1];
            row[2] = p[2];
        }
        Self { points: arr }
    }

    /// Build a cloud from interleaved 8-bit RGB samples.
    ///
    /// Trailing bytes that do not form a full triple are ignored.
    pub fn from_rgb8(samples: &[u8]) -> Self {
        let n = samples.len() / CHANNELS;
        let mut arr = Array2::zeros((n, CHANNELS));
        for (mut row, px) in arr.outer_iter_mut().zip(samples.chunks_exact(CHANNELS)) {
            row[0] = f32::from(px[0]);
            row[1] = f32::from(px[1]);
            row[2] = f32::from(px[2]);
        }
        Self { points: arr }
    }

    /// A cloud of `n` points at the origin.
    pub fn zeros(n: usize) -> Self {
        Self {
            points: Array2::zeros((n, CHANNELS)),
        }
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    /// `true` if the cloud has no points.
    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    /// Read-only view of the `N × 3` array.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.points.view()
    }

    /// Point `i` as a view of length 3.
    pub fn row(&self, i: usize) -> ArrayView1<'_, f32> {
        self.points.row(i)
    }

    /// Point `i` as an owned triple.
    pub fn point(&self, i: usize) -> [f32; 3] {
        let r = self.points.row(i);
        [r[0], r[1], r[2]]
    }

    /// Per-channel mean, or zeros for an empty cloud.
    pub fn mean(&self) -> [f32; 3] {
        match self.points.mean_axis(Axis(0)) {
            Some(m) => [m[0], m[1], m[2]],
            None => [0.0; 3],
        }
    }

    /// Clamp to `[0, 255]`, round to nearest and interleave as 8-bit RGB.
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.points.iter().map(|&v| quantize(v)).collect()
    }

    /// Move each point by the matching field vector scaled by `weight`.
    pub fn displace(&mut self, field: &DisplacementField, weight: f32) -> Result<()> {
        if field.len() != self.len() {
            return Err(Error::ShapeMismatch(self.len(), field.len()));
        }
        self.points.scaled_add(weight, &field.vectors);
        Ok(())
    }

    pub(crate) fn as_array_mut(&mut self) -> &mut Array2<f32> {
        &mut self.points
    }

    /// Consume the cloud and return its array.
    pub fn into_array(self) -> Array2<f32> {
        self.points
    }
}

/// Clamp a channel value to the displayable range and round it.
pub fn quantize(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.clamp(0.0, 255.0).round() as u8
}

/// Per-point displacement vectors, indexed like the source cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
    vectors: Array2<f32>,
}

impl DisplacementField {
    /// An all-zero field for `n` points.
    pub fn zeros(n: usize) -> Self {
        Self {
            vectors: Array2::zeros((n, CHANNELS)),
        }
    }

    /// Wrap an `N × 3` array.
    pub fn new(vectors: Array2<f32>) -> Result<Self> {
        if vectors.ncols() != CHANNELS {
            return Err(Error::ChannelCount(vectors.ncols()));
        }
        Ok(Self { vectors })
    }

    /// The field that carries `from` onto `to`, i.e. `to - from`.
    pub fn between(from: &ColorPointCloud, to: &ColorPointCloud) -> Result<Self> {
        if from.len() != to.len() {
            return Err(Error::ShapeMismatch(from.len(), to.len()));
        }
        Ok(Self {
            vectors: &to.points - &from.points,
        })
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    /// `true` if the field has no vectors.
    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }

    /// Read-only view of the `N × 3` array.
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.vectors.view()
    }

    /// Vector `i` as an owned triple.
    pub fn vector(&self, i: usize) -> [f32; 3] {
        let r = self.vectors.row(i);
        [r[0], r[1], r[2]]
    }

    /// Mean Euclidean length of the vectors (0 for an empty field).
    pub fn mean_magnitude(&self) -> f32 {
        mean_row_norm(&self.vectors.view())
    }

    /// Consume the field and return its array.
    pub fn into_array(self) -> Array2<f32> {
        self.vectors
    }
}

pub(crate) fn mean_row_norm(a: &ArrayView2<'_, f32>) -> f32 {
    let n = a.nrows();
    if n == 0 {
        return 0.0;
    }
    let total: f64 = a
        .outer_iter()
        .map(|r| f64::from(r.dot(&r)).sqrt())
        .sum();
    (total / n as f64) as f32
}
