// THEORY:
// The Aggregate Statistics Engine summarizes a whole image, at full resolution,
// into a handful of numbers: summed and averaged XYZ, and the mean and
// population standard deviation of its chromaticity coordinates.
//
// Key architectural principles:
// 1.  **Streaming**: Chromaticity statistics are accumulated with Welford's online
//     algorithm instead of collecting one (x, y) tuple per pixel, so memory stays
//     constant regardless of resolution.
// 2.  **Mergeable**: Accumulators combine (Chan's parallel update), which lets the
//     parallel pipeline split the image into row bands and reduce the partial
//     results in band order.
// 3.  **Skip-and-exclude**: A pixel whose XYZ sum is zero still adds to the XYZ
//     total but never enters the chromaticity statistics or the valid count.
// 4.  **Degenerate defaults**: With no valid pixels every statistic is zero rather
//     than NaN, and the record reports itself as empty.
//
// `extract_rgb` is deliberately *not* an aggregate: it is a spot sample of the
// top-left pixel.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core_modules::D1::pixel::pixel::NormalizedPixel;
use crate::core_modules::color_space::{Chromaticity, GammaPolicy, Xyz, XyzMatrix};
use crate::core_modules::matrix::Matrix;
use crate::core_modules::pixel_sampler::RasterImage;
use crate::error::{Result, VisionError};

/// Which 2-D chromaticity projection a statistic is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChromaticitySystem {
    #[default]
    CieXy,
    NormalizedRg,
}

/// Mean and population standard deviation over one chromaticity system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChromaticityStat {
    pub mean: Chromaticity,
    pub std_dev: Chromaticity,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct XyzAggregate {
    pub total: Xyz,
    pub average: Xyz,
}

/// A single representative 8-bit RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RgbSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Welford accumulator over 2-D points.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromaticityAccumulator {
    count: u64,
    mean_x: f64,
    mean_y: f64,
    m2_x: f64,
    m2_y: f64,
}

impl ChromaticityAccumulator {
    pub fn push(&mut self, point: Chromaticity) {
        self.count += 1;
        let n = self.count as f64;

        let delta_x = point.x - self.mean_x;
        self.mean_x += delta_x / n;
        self.m2_x += delta_x * (point.x - self.mean_x);

        let delta_y = point.y - self.mean_y;
        self.mean_y += delta_y / n;
        self.m2_y += delta_y * (point.y - self.mean_y);
    }

    pub fn merge(&mut self, other: &ChromaticityAccumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;

        let delta_x = other.mean_x - self.mean_x;
        let delta_y = other.mean_y - self.mean_y;
        self.mean_x += delta_x * n_b / n;
        self.mean_y += delta_y * n_b / n;
        self.m2_x += other.m2_x + delta_x * delta_x * n_a * n_b / n;
        self.m2_y += other.m2_y + delta_y * delta_y * n_a * n_b / n;
        self.count += other.count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Population statistics (divide by N). Zero when nothing was pushed.
    pub fn finish(&self) -> ChromaticityStat {
        if self.count == 0 {
            return ChromaticityStat::default();
        }
        let n = self.count as f64;
        ChromaticityStat {
            mean: Chromaticity::new(self.mean_x, self.mean_y),
            std_dev: Chromaticity::new(
                (self.m2_x / n).max(0.0).sqrt(),
                (self.m2_y / n).max(0.0).sqrt(),
            ),
        }
    }
}

/// Per-call running state of the aggregate pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateAccumulator {
    total: Xyz,
    xy: ChromaticityAccumulator,
    rg: ChromaticityAccumulator,
    pixel_count: u64,
}

impl AggregateAccumulator {
    pub fn push(&mut self, pixel: &NormalizedPixel, gamma: GammaPolicy, matrix: XyzMatrix) {
        self.pixel_count += 1;
        let xyz = pixel.xyz(gamma, matrix);
        self.total += xyz;

        let sum = xyz.sum();
        if sum > 0.0 {
            self.xy.push(Chromaticity::new(xyz.x / sum, xyz.y / sum));
        }
        if let Some(normalized) = pixel.normalized_chromaticity() {
            self.rg.push(normalized.rg());
        }
    }

    pub fn merge(&mut self, other: &AggregateAccumulator) {
        self.total += other.total;
        self.xy.merge(&other.xy);
        self.rg.merge(&other.rg);
        self.pixel_count += other.pixel_count;
    }

    pub fn finish(&self) -> AggregateStatistics {
        let valid_pixel_count = self.xy.count();
        let divisor = if valid_pixel_count > 0 {
            valid_pixel_count
        } else {
            self.pixel_count
        };
        let average = if divisor > 0 {
            self.total.scaled(1.0 / divisor as f64)
        } else {
            Xyz::default()
        };

        AggregateStatistics {
            chromaticity: self.xy.finish(),
            rg_chromaticity: self.rg.finish(),
            xyz: XyzAggregate {
                total: self.total,
                average,
            },
            valid_pixel_count,
            pixel_count: self.pixel_count,
        }
    }
}

/// Whole-image aggregates for one analysis call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateStatistics {
    /// CIE-xy statistics over pixels with a positive XYZ sum.
    pub chromaticity: ChromaticityStat,
    /// Normalized (r', g') statistics over pixels with a positive RGB sum.
    pub rg_chromaticity: ChromaticityStat,
    pub xyz: XyzAggregate,
    pub valid_pixel_count: u64,
    pub pixel_count: u64,
}

impl AggregateStatistics {
    pub fn is_empty(&self) -> bool {
        self.valid_pixel_count == 0
    }

    pub fn chromaticity_for(&self, system: ChromaticitySystem) -> ChromaticityStat {
        match system {
            ChromaticitySystem::CieXy => self.chromaticity,
            ChromaticitySystem::NormalizedRg => self.rg_chromaticity,
        }
    }

    /// `Err(EmptyImage)` when no pixel contributed to the chromaticity statistics.
    pub fn require_valid(&self) -> Result<&Self> {
        if self.is_empty() {
            return Err(VisionError::EmptyImage);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateEngine {
    pub gamma: GammaPolicy,
    pub matrix: XyzMatrix,
}

impl AggregateEngine {
    pub fn new(gamma: GammaPolicy, matrix: XyzMatrix) -> Self {
        Self { gamma, matrix }
    }

    /// Accumulates rows `rows` of `image` into a fresh accumulator.
    pub fn accumulate_rows(
        &self,
        image: &RasterImage,
        rows: std::ops::Range<u32>,
    ) -> AggregateAccumulator {
        let mut accumulator = AggregateAccumulator::default();
        for pixel in image.sample_rows(rows) {
            accumulator.push(&pixel, self.gamma, self.matrix);
        }
        accumulator
    }

    /// One sequential pass over every pixel.
    pub fn compute(&self, image: &RasterImage) -> AggregateStatistics {
        let statistics = self.accumulate_rows(image, 0..image.height()).finish();
        debug!(
            pixels = statistics.pixel_count,
            valid = statistics.valid_pixel_count,
            gamma = ?self.gamma,
            matrix = ?self.matrix,
            "computed aggregate statistics"
        );
        if statistics.is_empty() {
            warn!(
                pixels = statistics.pixel_count,
                "no valid pixels, chromaticity statistics fall back to zero"
            );
        }
        statistics
    }
}

/// The top-left pixel as 8-bit RGB; `None` for an empty image.
pub fn extract_rgb(image: &RasterImage) -> Option<RgbSample> {
    image.pixel_at(0, 0).map(|pixel| RgbSample {
        r: pixel.red,
        g: pixel.green,
        b: pixel.blue,
    })
}

/// A `bins x bins` count matrix of normalized (r', g') chromaticities.
/// Row index is the g' bin, column index the r' bin; black pixels are skipped.
pub fn chromaticity_histogram(image: &RasterImage, bins: usize) -> Result<Matrix> {
    if bins == 0 {
        return Err(VisionError::InvalidDimensions(
            "histogram needs at least one bin".to_string(),
        ));
    }
    let bin_of = |value: f64| ((value * bins as f64) as usize).min(bins - 1);

    let mut histogram = Matrix::zeros(bins, bins);
    for pixel in image.samples() {
        if let Some(normalized) = pixel.normalized_chromaticity() {
            let row = bin_of(normalized.g);
            let col = bin_of(normalized.r);
            let current = histogram.get(row, col).unwrap_or(0.0);
            histogram.set(row, col, current + 1.0);
        }
    }
    Ok(histogram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::color_space::xyz_to_chromaticity;
    use approx::assert_abs_diff_eq;

    fn primaries() -> RasterImage {
        RasterImage::new(
            2,
            2,
            vec![255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 0, 0, 0, 255],
        )
        .unwrap()
    }

    fn noisy(width: u32, height: u32) -> RasterImage {
        let mut data = Vec::new();
        for i in 0..(width * height) {
            data.extend_from_slice(&[
                (i * 37 % 256) as u8,
                (i * 91 % 256) as u8,
                (i * 13 % 256) as u8,
                255,
            ]);
        }
        RasterImage::new(width, height, data).unwrap()
    }

    #[test]
    fn uniform_image_has_zero_spread() {
        let image = RasterImage::new(4, 3, [120u8, 200, 40, 255].repeat(12)).unwrap();
        let engine = AggregateEngine::default();
        let stats = engine.compute(&image);

        let pixel = image.normalized_at(0, 0).unwrap();
        let expected = pixel.chromaticity_xy(engine.gamma, engine.matrix).unwrap();
        assert_eq!(stats.chromaticity.std_dev, Chromaticity::new(0.0, 0.0));
        assert_abs_diff_eq!(stats.chromaticity.mean.x, expected.x, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.chromaticity.mean.y, expected.y, epsilon = 1e-12);
        assert_eq!(stats.valid_pixel_count, 12);
    }

    #[test]
    fn black_pixels_are_excluded() {
        let stats = AggregateEngine::default().compute(&primaries());
        assert_eq!(stats.pixel_count, 4);
        assert_eq!(stats.valid_pixel_count, 3);

        // Linear primaries at full intensity sum to the matrix row sums.
        assert_abs_diff_eq!(stats.xyz.total.x, 0.4887180 + 0.3106803 + 0.2006017, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.xyz.average.y, 1.0 / 3.0, epsilon = 1e-6);

        let red = xyz_to_chromaticity(&Xyz::new(0.4887180, 0.1762044, 0.0)).unwrap();
        let green = xyz_to_chromaticity(&Xyz::new(0.3106803, 0.8129847, 0.0102048)).unwrap();
        let blue = xyz_to_chromaticity(&Xyz::new(0.2006017, 0.0108109, 0.9897952)).unwrap();
        let mean_x = (red.x + green.x + blue.x) / 3.0;
        let variance_x = [red.x, green.x, blue.x]
            .iter()
            .map(|x| (x - mean_x).powi(2))
            .sum::<f64>()
            / 3.0;
        assert_abs_diff_eq!(stats.chromaticity.mean.x, mean_x, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.chromaticity.std_dev.x, variance_x.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn all_black_image_falls_back_to_zero() {
        let image = RasterImage::new(2, 2, [0u8, 0, 0, 255].repeat(4)).unwrap();
        let stats = AggregateEngine::default().compute(&image);
        assert!(stats.is_empty());
        assert_eq!(stats.chromaticity, ChromaticityStat::default());
        assert_eq!(stats.xyz.average, Xyz::default());
        assert!(matches!(stats.require_valid(), Err(VisionError::EmptyImage)));
    }

    #[test]
    fn zero_size_image_is_degenerate() {
        let image = RasterImage::new(0, 0, Vec::new()).unwrap();
        let stats = AggregateEngine::default().compute(&image);
        assert_eq!(stats.pixel_count, 0);
        assert!(stats.is_empty());
        assert!(!stats.xyz.average.x.is_nan());
        assert_eq!(extract_rgb(&image), None);
    }

    #[test]
    fn merged_bands_match_single_pass() {
        let image = noisy(13, 11);
        let engine = AggregateEngine::new(GammaPolicy::PiecewiseSrgb, XyzMatrix::SrgbD65);
        let single = engine.compute(&image);

        let mut merged = engine.accumulate_rows(&image, 0..4);
        merged.merge(&engine.accumulate_rows(&image, 4..5));
        merged.merge(&engine.accumulate_rows(&image, 5..11));
        let merged = merged.finish();

        assert_eq!(merged.valid_pixel_count, single.valid_pixel_count);
        assert_abs_diff_eq!(
            merged.chromaticity.mean.x,
            single.chromaticity.mean.x,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            merged.chromaticity.std_dev.y,
            single.chromaticity.std_dev.y,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            merged.rg_chromaticity.std_dev.x,
            single.rg_chromaticity.std_dev.x,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(merged.xyz.total.z, single.xyz.total.z, epsilon = 1e-9);
    }

    #[test]
    fn rgb_is_a_spot_sample() {
        assert_eq!(extract_rgb(&primaries()), Some(RgbSample { r: 255, g: 0, b: 0 }));
    }

    #[test]
    fn normalized_rg_mean_of_primaries() {
        let stats = AggregateEngine::default().compute(&primaries());
        let rg = stats.chromaticity_for(ChromaticitySystem::NormalizedRg);
        assert_abs_diff_eq!(rg.mean.x, 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rg.mean.y, 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn histogram_counts_chromaticities() {
        let histogram = chromaticity_histogram(&primaries(), 10).unwrap();
        assert_eq!(histogram.dimensions(), (10, 10));
        assert_eq!(histogram.get(0, 9), Some(1.0)); // red: r'=1, g'=0
        assert_eq!(histogram.get(9, 0), Some(1.0)); // green
        assert_eq!(histogram.get(0, 0), Some(1.0)); // blue
        assert_eq!(histogram.values().sum::<f64>(), 3.0);
        assert!(chromaticity_histogram(&primaries(), 0).is_err());
    }
}
