// THEORY:
// The hue matrix is the spatial view of an image: one hue per pixel, laid out on
// the pixel grid. Full-resolution matrices are prohibitively large, so callers
// either hand over an image they already shrank or let the builder fit it into a
// bounded box first (100x100 by default in the pipeline).
//
// Two cheaper relatives live here as well:
// - `sample_hue_grid`: the live-camera view. It spot-samples an N x N lattice of
//   pixels without resizing or averaging, which is all a 30 fps preview can afford.
// - `dominant_hues`: the most frequent hue values of a finished matrix.
//
// Hue always follows the degenerate-pixel policy: 0 for black and for any pixel
// whose saturation is below the configured threshold.

use std::collections::HashMap;

use tracing::debug;

use crate::core_modules::color_space::{DEFAULT_SATURATION_THRESHOLD, Hue};
use crate::core_modules::matrix::{HueMatrix, Matrix};
use crate::core_modules::pixel_sampler::{PixelSampler, RasterImage};
use crate::error::{Result, VisionError};

#[derive(Debug, Clone)]
pub struct HueMatrixBuilder {
    pub saturation_threshold: f64,
    /// Box to fit the image into before sampling. `None` samples every pixel.
    pub fit: Option<(u32, u32)>,
}

impl Default for HueMatrixBuilder {
    fn default() -> Self {
        Self {
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
            fit: None,
        }
    }
}

impl HueMatrixBuilder {
    pub fn new(saturation_threshold: f64, fit: Option<(u32, u32)>) -> Self {
        Self {
            saturation_threshold,
            fit,
        }
    }

    /// Builds a matrix whose dimensions match the (possibly resized) image.
    pub fn build(&self, image: &RasterImage) -> Result<HueMatrix> {
        let sampler = PixelSampler::new(image, self.fit)?;
        let (width, height) = sampler.dimensions();
        let mut matrix = Matrix::zeros(height as usize, width as usize);

        for (index, pixel) in sampler.enumerate() {
            let row = index / width as usize;
            let col = index % width as usize;
            matrix.set(row, col, pixel.hue(self.saturation_threshold));
        }

        debug!(rows = height, cols = width, "built hue matrix");
        Ok(matrix)
    }
}

/// Hue matrix of `image` at its own resolution with the default threshold.
pub fn build_hue_matrix(image: &RasterImage) -> Result<HueMatrix> {
    HueMatrixBuilder::default().build(image)
}

/// Spot-samples a `grid_size x grid_size` lattice: cell (row, col) takes the hue
/// of the pixel at (row * height / grid_size, col * width / grid_size).
pub fn sample_hue_grid(
    frame: &RasterImage,
    grid_size: u32,
    saturation_threshold: f64,
) -> Result<HueMatrix> {
    if grid_size == 0 {
        return Err(VisionError::InvalidDimensions(
            "live grid size must be at least 1".to_string(),
        ));
    }
    if frame.is_empty() {
        return Err(VisionError::EmptyImage);
    }

    let row_stride = frame.height() / grid_size;
    let col_stride = frame.width() / grid_size;
    let mut grid = Matrix::zeros(grid_size as usize, grid_size as usize);

    for row in 0..grid_size {
        for col in 0..grid_size {
            let pixel = frame
                .normalized_at(col * col_stride, row * row_stride)
                .ok_or_else(|| VisionError::Decode("frame sample out of bounds".to_string()))?;
            grid.set(row as usize, col as usize, pixel.hue(saturation_threshold));
        }
    }
    Ok(grid)
}

/// The `count` most frequent hue values, most frequent first. Ties go to the
/// smaller hue.
pub fn dominant_hues(matrix: &HueMatrix, count: usize) -> Vec<Hue> {
    let mut frequencies: HashMap<u64, usize> = HashMap::new();
    for hue in matrix.values() {
        // -0.0 and 0.0 share a bucket.
        let key = if hue == 0.0 { 0.0f64.to_bits() } else { hue.to_bits() };
        *frequencies.entry(key).or_default() += 1;
    }

    let mut ranked: Vec<(Hue, usize)> = frequencies
        .into_iter()
        .map(|(bits, n)| (f64::from_bits(bits), n))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.total_cmp(&b.0)));
    ranked.into_iter().take(count).map(|(hue, _)| hue).collect()
}
