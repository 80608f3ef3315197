//! # colorot
//!
//! Color transfer by sliced optimal transport: reshape the color distribution
//! of a source image so it matches one or more target images.
//!
//! ## The Problem
//!
//! Treat every pixel as a point in 3D color space. The source image is one
//! point cloud, the target another. We want a per-pixel displacement that
//! carries the source cloud onto the target cloud while moving colors as
//! little as possible, and then we want to mix several such displacements.
//!
//! ## How
//!
//! Exact transport between two clouds of a million points is out of reach,
//! but on a line it is just sorting. The solver repeatedly:
//!
//! 1. draws random unit directions ([`direction`]),
//! 2. projects the current and target clouds on each and pairs them by rank ([`slice`]),
//! 3. averages the per-direction displacements ([`average`]),
//! 4. moves the current cloud by that average ([`solver`]).
//!
//! The accumulated movement is the transport field; [`blend`] applies any
//! weighted mix of fields to the source.
//!
//! ## Key Functions
//!
//! | Function | Use Case | Complexity |
//! |----------|----------|------------|
//! | [`solve`] | Transport field for one source/target pair | O(iters × B × n log n) |
//! | [`blend::blend`] | Weighted mix of fields onto a source | O(k × n) |
//! | [`sliced_wasserstein`] | Distance between two clouds | O(L × n log n) |
//! | [`pipeline::transfer`] | Images in, image out | O(k × iters × B × n log n) |
//!
//! ## Quick Start
//!
//! ```rust
//! use colorot::{blend, solve, ColorPointCloud, SolverConfig, TransportJob};
//!
//! let source = ColorPointCloud::from_points(&[[20.0, 30.0, 40.0], [60.0, 60.0, 60.0], [90.0, 10.0, 0.0]]);
//! let target = ColorPointCloud::from_points(&[[200.0, 30.0, 40.0], [240.0, 60.0, 60.0], [250.0, 10.0, 0.0]]);
//!
//! let cfg = SolverConfig::default().with_iterations(50).with_batch_size(8);
//! let field = solve(TransportJob::new(source.clone(), target, cfg).unwrap()).unwrap();
//!
//! // Halfway between the source colors and the target colors.
//! let half = blend::blend(&source, &[(&field, 0.5)]).unwrap();
//! assert_eq!(half.len(), 3);
//! ```
//!
//! ## What Can Go Wrong
//!
//! 1. **Different image sizes**: clouds must have one point per pixel and equal length.
//! 2. **Too few directions**: small batches give noisy increments; raise `batch_size`.
//! 3. **Too few iterations**: there is no convergence test; the field stops where the count ends.
//! 4. **Extrapolated weights**: values leave `[0, 255]` and are clamped only when encoding.
//!
//! ## References
//!
//! - Pitié, Kokaram, Dahyot (2005). "N-Dimensional Probability Density Function Transfer
//!   and its Application to Colour Transfer"
//! - Rabin, Peyré, Delon, Bernot (2012). "Wasserstein Barycenter and Its Application to
//!   Texture Mixing"
//! - Bonneel, Rabin, Peyré, Pfister (2015). "Sliced and Radon Wasserstein Barycenters of Measures"

use std::path::PathBuf;
use thiserror::Error;

pub mod average;
pub mod blend;
pub mod cloud;
pub mod config;
pub mod diagnostics;
pub mod direction;
pub mod histogram;
pub mod image_io;
pub mod pipeline;
pub mod slice;
pub mod solver;

pub use average::Averaging;
pub use blend::BlendRequest;
pub use cloud::{ColorPointCloud, DisplacementField};
pub use direction::{Direction, DirectionSampler};
pub use solver::{
    solve, solve_with, CancelToken, SeedPolicy, SlicedTransportSolver, SolverConfig, SolverState,
    TransportJob,
};

/// Color transfer error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Source and target clouds have different lengths.
    #[error("point clouds have different lengths: source {0} vs target {1}")]
    ShapeMismatch(usize, usize),

    /// A cloud that must hold points is empty.
    #[error("{0} point cloud is empty")]
    EmptyCloud(&'static str),

    /// An array handed to a cloud does not have three columns.
    #[error("expected 3 color channels, got {0}")]
    ChannelCount(usize),

    /// A target image does not have the source image's dimensions.
    #[error("{path}: expected {}x{} pixels, found {}x{}", .expected.0, .expected.1, .found.0, .found.1)]
    ImageDimensions {
        path: PathBuf,
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// An image could not be read or written.
    #[error("{path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Invalid solver or job settings.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The solve was cancelled at an iteration boundary.
    #[error("cancelled after {0} iterations")]
    Cancelled(usize),

    /// Filesystem error while writing outputs or reading a job file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Diagnostics or histogram CSV could not be written.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Job file is not valid JSON for [`config::TransferConfig`].
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for color transfer operations.
pub type Result<T> = std::result::Result<T, Error>;

const EPSILON: f32 = 1e-7;

/// Sliced Wasserstein distance between two equal-length clouds.
///
/// Projects both clouds onto random directions and averages the 1D W₁
/// distances, each the mean absolute difference of sorted projections.
/// Directions come from a stream seeded with `seed`.
///
/// # Arguments
///
/// * `x` - First cloud
/// * `y` - Second cloud (same length as `x`)
/// * `n_projections` - Number of random directions
/// * `seed` - Seed of the direction stream
///
/// # Returns
///
/// Sliced W₁ distance, `0.0` for empty clouds or zero projections.
pub fn sliced_wasserstein(
    x: &ColorPointCloud,
    y: &ColorPointCloud,
    n_projections: usize,
    seed: u64,
) -> Result<f32> {
    if x.len() != y.len() {
        return Err(Error::ShapeMismatch(x.len(), y.len()));
    }
    let n = x.len();
    if n == 0 || n_projections == 0 {
        return Ok(0.0);
    }

    let mut sampler = DirectionSampler::from_key(seed);
    let mut proj_x = vec![0.0f32; n];
    let mut proj_y = vec![0.0f32; n];
    let mut total = 0.0f64;

    for _ in 0..n_projections {
        let d = sampler.sample();
        for (p, row) in proj_x.iter_mut().zip(x.view().outer_iter()) {
            *p = d.project([row[0], row[1], row[2]]);
        }
        for (p, row) in proj_y.iter_mut().zip(y.view().outer_iter()) {
            *p = d.project([row[0], row[1], row[2]]);
        }

        proj_x.sort_unstable_by(|a, b| a.total_cmp(b));
        proj_y.sort_unstable_by(|a, b| a.total_cmp(b));

        let w1: f64 = proj_x
            .iter()
            .zip(&proj_y)
            .map(|(a, b)| f64::from((a - b).abs()))
            .sum::<f64>()
            / n as f64;
        total += w1;
    }

    Ok((total / n_projections as f64) as f32)
}
