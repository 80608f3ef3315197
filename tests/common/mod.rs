//! Synthetic clouds and images shared by the end-to-end tests.

#![allow(dead_code)]

use colorot::ColorPointCloud;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::path::Path;

/// `n` colors drawn from an axis-aligned Gaussian around `mean`.
pub fn gaussian_cloud(n: usize, mean: [f32; 3], std: [f32; 3], seed: u64) -> ColorPointCloud {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let dists: Vec<Normal<f32>> = (0..3).map(|c| Normal::new(mean[c], std[c]).unwrap()).collect();
    let pts: Vec<[f32; 3]> = (0..n)
        .map(|_| {
            [
                dists[0].sample(&mut rng),
                dists[1].sample(&mut rng),
                dists[2].sample(&mut rng),
            ]
        })
        .collect();
    ColorPointCloud::from_points(&pts)
}

/// Write a `width × height` PNG whose pixels come from a Gaussian color cloud.
pub fn write_gaussian_png(path: &Path, width: u32, height: u32, mean: [f32; 3], std: [f32; 3], seed: u64) {
    let cloud = gaussian_cloud((width * height) as usize, mean, std, seed);
    colorot::image_io::encode(path, width, height, &cloud).unwrap();
}
