// THEORY:
// The `pixel_sampler` module is the bridge between a caller-owned bitmap and the
// per-pixel heuristics. It slices raw bytes into pixels, generalized to the
// buffers real capture paths hand over:
// 1.  **Row stride**: camera buffers pad rows, so a row is `stride` bytes long and
//     only its first `width * 4` bytes carry pixels.
// 2.  **Channel layout**: still images arrive as RGBA, live frames as BGRA, and one
//     pipeline mode delivers dual-green RGBG quads whose greens are averaged.
// 3.  **Fit resizing**: cost-bounded consumers (the hue matrix) ask for a copy
//     shrunk into a target box, keeping the aspect ratio. Images that already fit
//     are never enlarged.
//
// The sampler itself is a lazy, restartable row-major iterator. Calling it twice on
// the same image yields the same sequence; nothing is cached between calls.

use std::borrow::Cow;
use std::ops::Range;

use image::{ImageBuffer, Rgba, imageops::FilterType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core_modules::D1::pixel::pixel::{CHANNELS, NormalizedPixel, Pixel};
use crate::error::{Result, VisionError};

/// Byte order of each 4-byte pixel quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelLayout {
    #[default]
    Rgba,
    Bgra,
    /// R, G1, B, G2 with no alpha; green is `(g1 + g2) / 2`.
    Rgbg,
}

impl ChannelLayout {
    /// Decodes one quad into normalized channels.
    #[inline]
    pub fn normalize(self, quad: &[u8]) -> NormalizedPixel {
        let n = |byte: u8| byte as f64 / 255.0;
        match self {
            ChannelLayout::Rgba => {
                NormalizedPixel::new(n(quad[0]), n(quad[1]), n(quad[2]), n(quad[3]))
            }
            ChannelLayout::Bgra => {
                NormalizedPixel::new(n(quad[2]), n(quad[1]), n(quad[0]), n(quad[3]))
            }
            ChannelLayout::Rgbg => {
                NormalizedPixel::new(n(quad[0]), (n(quad[1]) + n(quad[3])) / 2.0, n(quad[2]), 1.0)
            }
        }
    }

    /// Decodes one quad into 8-bit RGBA. The dual greens are averaged with
    /// integer truncation.
    #[inline]
    pub fn pixel(self, quad: &[u8]) -> Pixel {
        match self {
            ChannelLayout::Rgba => Pixel::new(quad[0], quad[1], quad[2], quad[3]),
            ChannelLayout::Bgra => Pixel::new(quad[2], quad[1], quad[0], quad[3]),
            ChannelLayout::Rgbg => {
                let green = ((quad[1] as u16 + quad[3] as u16) / 2) as u8;
                Pixel::new(quad[0], green, quad[2], u8::MAX)
            }
        }
    }
}

/// A decoded bitmap: `height` rows of `stride` bytes, each row starting with
/// `width` four-byte quads. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    stride: usize,
    layout: ChannelLayout,
    data: Vec<u8>,
}

impl RasterImage {
    /// A tightly packed RGBA image.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::with_layout(width, height, width as usize * CHANNELS, ChannelLayout::Rgba, data)
    }

    pub fn with_layout(
        width: u32,
        height: u32,
        stride: usize,
        layout: ChannelLayout,
        data: Vec<u8>,
    ) -> Result<Self> {
        let row_bytes = width as usize * CHANNELS;
        if stride < row_bytes {
            return Err(VisionError::Decode(format!(
                "row stride {stride} is shorter than {width} pixels"
            )));
        }
        let required = if width == 0 || height == 0 {
            0
        } else {
            stride * (height as usize - 1) + row_bytes
        };
        if data.len() < required {
            if data.is_empty() {
                return Err(VisionError::Decode("no pixel data available".to_string()));
            }
            return Err(VisionError::Decode(format!(
                "pixel buffer holds {} bytes, {width}x{height} needs {required}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            layout,
            data,
        })
    }

    pub fn from_rgba_image(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            stride: width as usize * CHANNELS,
            layout: ChannelLayout::Rgba,
            data: image.into_raw(),
        }
    }

    /// Decodes encoded bytes (PNG, JPEG, TIFF, ...) into an RGBA raster.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(VisionError::Decode("no image data".to_string()));
        }
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba_image(decoded.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// The pixel bytes of row `y`, without stride padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        Some(&self.data[start..start + self.width as usize * CHANNELS])
    }

    pub fn quad(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width {
            return None;
        }
        let offset = x as usize * CHANNELS;
        self.row(y).map(|row| &row[offset..offset + CHANNELS])
    }

    pub fn pixel_at(&self, x: u32, y: u32) -> Option<Pixel> {
        self.quad(x, y).map(|quad| self.layout.pixel(quad))
    }

    pub fn normalized_at(&self, x: u32, y: u32) -> Option<NormalizedPixel> {
        self.quad(x, y).map(|quad| self.layout.normalize(quad))
    }

    /// A lazy row-major walk over every pixel.
    pub fn samples(&self) -> PixelSampler<'_> {
        PixelSampler::over_rows(Cow::Borrowed(self), 0..self.height)
    }

    /// A lazy row-major walk over `rows` only, clamped to the image.
    pub fn sample_rows(&self, rows: Range<u32>) -> PixelSampler<'_> {
        let end = rows.end.min(self.height);
        let start = rows.start.min(end);
        PixelSampler::over_rows(Cow::Borrowed(self), start..end)
    }

    /// Dimensions after an aspect-preserving fit into `target_width x target_height`.
    /// Images that already fit keep their size; the fit only ever shrinks.
    pub fn fit_dimensions(
        source_width: u32,
        source_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> (u32, u32) {
        if source_width == 0 || source_height == 0 {
            return (source_width, source_height);
        }
        let scale = (target_width as f64 / source_width as f64)
            .min(target_height as f64 / source_height as f64)
            .min(1.0);
        let width = ((source_width as f64 * scale).round() as u32).max(1);
        let height = ((source_height as f64 * scale).round() as u32).max(1);
        (width, height)
    }

    /// A resized copy fitting the target box. The channel layout is preserved;
    /// every channel is resampled independently.
    pub fn resize_to_fit(&self, target_width: u32, target_height: u32) -> Result<RasterImage> {
        if target_width == 0 || target_height == 0 {
            return Err(VisionError::InvalidDimensions(format!(
                "resize target {target_width}x{target_height} must be non-zero"
            )));
        }
        let (width, height) =
            Self::fit_dimensions(self.width, self.height, target_width, target_height);
        if self.is_empty() || (width, height) == (self.width, self.height) {
            return Ok(self.clone());
        }

        let mut packed = Vec::with_capacity(self.pixel_count() * CHANNELS);
        for y in 0..self.height {
            if let Some(row) = self.row(y) {
                packed.extend_from_slice(row);
            }
        }
        let source: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_raw(self.width, self.height, packed).ok_or_else(|| {
                VisionError::Decode("pixel buffer does not match its dimensions".to_string())
            })?;
        let resized = image::imageops::resize(&source, width, height, FilterType::Triangle);
        debug!(
            from_width = self.width,
            from_height = self.height,
            width,
            height,
            "resized raster to fit"
        );

        Ok(RasterImage {
            width,
            height,
            stride: width as usize * CHANNELS,
            layout: self.layout,
            data: resized.into_raw(),
        })
    }
}

/// Yields `NormalizedPixel`s in row-major order.
pub struct PixelSampler<'a> {
    image: Cow<'a, RasterImage>,
    row: u32,
    col: u32,
    end_row: u32,
}

impl<'a> PixelSampler<'a> {
    /// Samples `image`, first fitting it into `target` when one is given.
    pub fn new(image: &'a RasterImage, target: Option<(u32, u32)>) -> Result<Self> {
        let image = match target {
            Some((width, height)) => Cow::Owned(image.resize_to_fit(width, height)?),
            None => Cow::Borrowed(image),
        };
        let height = image.height();
        Ok(Self::over_rows(image, 0..height))
    }

    fn over_rows(image: Cow<'a, RasterImage>, rows: Range<u32>) -> Self {
        let end_row = if image.width() == 0 { rows.start } else { rows.end };
        Self {
            image,
            row: rows.start,
            col: 0,
            end_row,
        }
    }

    /// Dimensions of the image actually being sampled.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &RasterImage {
        &self.image
    }

    fn remaining(&self) -> usize {
        if self.row >= self.end_row {
            return 0;
        }
        let rows_left = (self.end_row - self.row) as usize;
        rows_left * self.image.width() as usize - self.col as usize
    }
}

impl Iterator for PixelSampler<'_> {
    type Item = NormalizedPixel;

    fn next(&mut self) -> Option<Self::Item> {
        if self.row >= self.end_row {
            return None;
        }
        let pixel = self.image.normalized_at(self.col, self.row)?;
        self.col += 1;
        if self.col == self.image.width() {
            self.col = 0;
            self.row += 1;
        }
        Some(pixel)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PixelSampler<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn gradient(width: u32, height: u32) -> RasterImage {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 10) as u8, (y * 10) as u8, 0, 255]);
            }
        }
        RasterImage::new(width, height, data).unwrap()
    }

    #[test]
    fn samples_are_row_major_and_restartable() {
        let image = gradient(3, 2);
        let first: Vec<_> = image.samples().collect();
        let second: Vec<_> = image.samples().collect();
        assert_eq!(first.len(), 6);
        assert_eq!(first, second);
        assert_abs_diff_eq!(first[1].red, 10.0 / 255.0);
        assert_abs_diff_eq!(first[3].green, 10.0 / 255.0);
        assert_eq!(image.samples().len(), 6);
    }

    #[test]
    fn stride_padding_is_skipped() {
        let data = vec![
            255, 0, 0, 255, 9, 9, 9, 9, //
            0, 0, 255, 255, 9, 9, 9, 9,
        ];
        let image = RasterImage::with_layout(1, 2, 8, ChannelLayout::Rgba, data).unwrap();
        let pixels: Vec<_> = image.samples().collect();
        assert_eq!(pixels.len(), 2);
        assert_eq!(pixels[0].red, 1.0);
        assert_eq!(pixels[1].blue, 1.0);
    }

    #[test]
    fn layouts_decode_channels() {
        let quad = [10u8, 20, 30, 40];
        assert_eq!(ChannelLayout::Bgra.pixel(&quad), Pixel::new(30, 20, 10, 40));
        assert_eq!(ChannelLayout::Rgbg.pixel(&quad), Pixel::new(10, 30, 30, 255));
        let dual = ChannelLayout::Rgbg.normalize(&[0, 10, 0, 21]);
        assert_abs_diff_eq!(dual.green, 15.5 / 255.0, epsilon = 1e-12);
        assert_eq!(dual.alpha, 1.0);
    }

    #[test]
    fn missing_data_is_a_decode_error() {
        assert!(matches!(
            RasterImage::new(2, 2, Vec::new()),
            Err(VisionError::Decode(_))
        ));
        assert!(matches!(
            RasterImage::new(2, 2, vec![0; 15]),
            Err(VisionError::Decode(_))
        ));
        assert!(RasterImage::decode(&[1, 2, 3]).is_err());
        assert!(RasterImage::decode(&[]).is_err());
    }

    #[test]
    fn fit_preserves_aspect_ratio() {
        assert_eq!(RasterImage::fit_dimensions(400, 200, 100, 100), (100, 50));
        assert_eq!(RasterImage::fit_dimensions(200, 400, 100, 100), (50, 100));
        assert_eq!(RasterImage::fit_dimensions(1000, 1, 100, 100), (100, 1));
        assert_eq!(RasterImage::fit_dimensions(50, 50, 100, 100), (50, 50));
        assert_eq!(RasterImage::fit_dimensions(2, 2, 100, 100), (2, 2));
        assert_eq!(RasterImage::fit_dimensions(50, 400, 100, 100), (13, 100));
    }

    #[test]
    fn small_image_is_not_enlarged() {
        let image = gradient(3, 2);
        let fitted = image.resize_to_fit(100, 100).unwrap();
        assert_eq!(fitted, image);
        let sampler = PixelSampler::new(&image, Some((100, 100))).unwrap();
        assert_eq!(sampler.dimensions(), (3, 2));
    }

    #[test]
    fn resize_to_fit_produces_target_dimensions() {
        let image = gradient(20, 10);
        let resized = image.resize_to_fit(10, 10).unwrap();
        assert_eq!((resized.width(), resized.height()), (10, 5));
        assert_eq!(resized.samples().count(), 50);

        let sampler = PixelSampler::new(&image, Some((4, 4))).unwrap();
        assert_eq!(sampler.dimensions(), (4, 2));
        assert_eq!(sampler.count(), 8);
    }

    #[test]
    fn uniform_image_survives_resize() {
        let image = RasterImage::new(8, 8, [200u8, 100, 50, 255].repeat(64)).unwrap();
        let resized = image.resize_to_fit(3, 3).unwrap();
        for pixel in resized.samples() {
            assert_abs_diff_eq!(pixel.red, 200.0 / 255.0, epsilon = 1e-9);
            assert_abs_diff_eq!(pixel.blue, 50.0 / 255.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn sample_rows_clamps_to_image() {
        let image = gradient(2, 3);
        assert_eq!(image.sample_rows(1..10).count(), 4);
        assert_eq!(image.sample_rows(5..9).count(), 0);
    }
}
