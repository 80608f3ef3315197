//! Decoding images into clouds and encoding clouds back into images.

use crate::cloud::ColorPointCloud;
use crate::{Error, Result};
use image::RgbImage;
use std::path::Path;

/// A decoded image: its dimensions and one point per pixel in row-major order.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub cloud: ColorPointCloud,
}

impl DecodedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Load an image as RGB; alpha is dropped and channels are widened to `f32` in `[0, 255]`.
pub fn decode(path: &Path) -> Result<DecodedImage> {
    let img = image::open(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(DecodedImage {
        width,
        height,
        cloud: ColorPointCloud::from_rgb8(rgb.as_raw()),
    })
}

/// Clamp, round and write `cloud` as a `width × height` RGB image.
///
/// The format follows the file extension.
pub fn encode(path: &Path, width: u32, height: u32, cloud: &ColorPointCloud) -> Result<()> {
    let expected = width as usize * height as usize;
    if cloud.len() != expected {
        return Err(Error::ShapeMismatch(expected, cloud.len()));
    }
    let img = RgbImage::from_raw(width, height, cloud.to_rgb8())
        .ok_or(Error::ShapeMismatch(expected, cloud.len()))?;
    img.save(path).map_err(|source| Error::Image {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_round_trip_clamps_out_of_range_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let cloud = ColorPointCloud::from_points(&[
            [-20.0, 12.4, 12.6],
            [300.0, 128.0, 0.0],
            [1.0, 2.0, 3.0],
            [255.0, 254.5, 0.49],
        ]);
        encode(&path, 2, 2, &cloud).unwrap();

        let back = decode(&path).unwrap();
        assert_eq!(back.dimensions(), (2, 2));
        assert_eq!(back.cloud.point(0), [0.0, 12.0, 13.0]);
        assert_eq!(back.cloud.point(1), [255.0, 128.0, 0.0]);
        assert_eq!(back.cloud.point(2), [1.0, 2.0, 3.0]);
        assert_eq!(back.cloud.point(3), [255.0, 255.0, 0.0]);
    }

    #[test]
    fn alpha_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        let img = image::RgbaImage::from_raw(1, 1, vec![9, 8, 7, 0]).unwrap();
        img.save(&path).unwrap();
        let back = decode(&path).unwrap();
        assert_eq!(back.cloud.point(0), [9.0, 8.0, 7.0]);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = decode(Path::new("does/not/exist.png")).unwrap_err();
        match err {
            Error::Image { path, .. } => assert!(path.ends_with("exist.png")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn encode_rejects_wrong_pixel_count() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = ColorPointCloud::zeros(3);
        assert!(encode(&dir.path().join("x.png"), 2, 2, &cloud).is_err());
    }
}
