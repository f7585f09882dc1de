// THEORY:
// The `pipeline` module is the top-level API of the analysis engine. It wires the
// core modules into the single stateless call the host application needs:
// `analyze(image) -> AnalysisResult`.
//
// Stages, in order:
// 1.  **Aggregate pass**: every pixel of the full-resolution image goes through the
//     XYZ transform and the streaming chromaticity accumulators.
// 2.  **Spot sample**: the top-left pixel is reported as the "RGB value".
// 3.  **Spatial pass**: the image is fitted into the configured box and turned into
//     a hue matrix, which is then block-averaged into the compact display grid.
//
// The pipeline owns no UI state. Loading flags, the selected image and the
// current tab belong to the caller; each call starts from fresh accumulators and
// returns once finished.

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::core_modules::export::{AggregateDocument, ExportDocument};
use crate::core_modules::hue_matrix::{HueMatrixBuilder, dominant_hues, sample_hue_grid};
use crate::core_modules::matrix_compressor::compress_matrix;
use crate::core_modules::pixel_sampler::RasterImage;
use crate::core_modules::statistics::{AggregateEngine, extract_rgb};
use crate::error::{Result, VisionError};

// Re-export key data structures for the public API.
pub use crate::core_modules::color_space::{Chromaticity, Hue, Xyz};
pub use crate::core_modules::matrix::{CompressedMatrix, HueMatrix};
pub use crate::core_modules::statistics::{AggregateStatistics, ChromaticityStat, RgbSample};

/// Number of hues reported by [`AnalysisResult::dominant_hues`] by default.
pub const DOMINANT_HUE_COUNT: usize = 3;

/// Everything one analysis call produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub aggregate: AggregateStatistics,
    pub rgb: Option<RgbSample>,
    pub hue_matrix: HueMatrix,
    pub compressed: CompressedMatrix,
    /// Pass-through metadata text, never parsed.
    pub metadata: Option<String>,
    /// Set when no pixel contributed to the chromaticity statistics.
    pub empty_image: bool,
}

impl AnalysisResult {
    /// Surfaces the empty-image condition as an error.
    pub fn check(&self) -> Result<()> {
        if self.empty_image {
            return Err(VisionError::EmptyImage);
        }
        Ok(())
    }

    pub fn dominant_hues(&self) -> Vec<Hue> {
        dominant_hues(&self.hue_matrix, DOMINANT_HUE_COUNT)
    }

    pub fn hue_matrix_document(&self) -> ExportDocument {
        ExportDocument::HueMatrix(self.hue_matrix.clone())
    }

    pub fn aggregate_document(&self, config: &PipelineConfig) -> ExportDocument {
        ExportDocument::Aggregate(AggregateDocument::new(
            &self.aggregate,
            config.export_chromaticity,
            self.rgb,
            self.metadata.as_deref(),
        ))
    }
}

/// The main, top-level struct for the analysis engine.
#[derive(Debug, Clone, Default)]
pub struct AnalysisPipeline {
    config: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn aggregate_engine(&self) -> AggregateEngine {
        AggregateEngine::new(self.config.gamma, self.config.xyz_matrix)
    }

    pub(crate) fn hue_builder(&self) -> HueMatrixBuilder {
        HueMatrixBuilder::new(self.config.hue_saturation_threshold, self.config.hue_matrix_size)
    }

    /// Runs every stage on `image` and returns once finished.
    pub fn analyze(&self, image: &RasterImage) -> Result<AnalysisResult> {
        self.analyze_with_metadata(image, None)
    }

    pub fn analyze_with_metadata(
        &self,
        image: &RasterImage,
        metadata: Option<String>,
    ) -> Result<AnalysisResult> {
        debug!(
            width = image.width(),
            height = image.height(),
            layout = ?image.layout(),
            "analyzing image"
        );

        // Stage 1: Aggregate pass over the full-resolution image
        let aggregate = self.aggregate_engine().compute(image);

        // Stage 2: Spot sample
        let rgb = extract_rgb(image);

        // Stage 3: Spatial pass
        let hue_matrix = self.hue_builder().build(image)?;

        self.assemble(aggregate, rgb, hue_matrix, metadata)
    }

    /// Decodes encoded bytes and analyzes them. A decode failure aborts the
    /// call with no partial result.
    pub fn analyze_bytes(&self, bytes: &[u8], metadata: Option<String>) -> Result<AnalysisResult> {
        let image = RasterImage::decode(bytes)?;
        self.analyze_with_metadata(&image, metadata)
    }

    /// The live-camera view of a frame.
    pub fn live_hue_grid(&self, frame: &RasterImage) -> Result<HueMatrix> {
        sample_hue_grid(
            frame,
            self.config.live_grid_size,
            self.config.hue_saturation_threshold,
        )
    }

    pub(crate) fn assemble(
        &self,
        aggregate: AggregateStatistics,
        rgb: Option<RgbSample>,
        hue_matrix: HueMatrix,
        metadata: Option<String>,
    ) -> Result<AnalysisResult> {
        let compressed = compress_matrix(
            &hue_matrix,
            self.config.compressed_rows,
            self.config.compressed_cols,
        )?;

        let empty_image = aggregate.is_empty();
        if empty_image {
            warn!(pixels = aggregate.pixel_count, "analysis produced no valid pixels");
        }

        Ok(AnalysisResult {
            aggregate,
            rgb,
            hue_matrix,
            compressed,
            metadata,
            empty_image,
        })
    }
}
