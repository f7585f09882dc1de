//! Tunable behavior of the analysis pipeline.
//!
//! Every field has a default matching the reference mobile pipeline, so an
//! empty JSON object is a valid configuration:
//!
//! ```no_run
//! use chroma_vision::config::PipelineConfig;
//! use std::path::Path;
//!
//! let config = PipelineConfig::from_json_file(Path::new("pipeline.json"))?;
//! # Ok::<(), chroma_vision::error::VisionError>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core_modules::color_space::{DEFAULT_SATURATION_THRESHOLD, GammaPolicy, XyzMatrix};
use crate::core_modules::statistics::ChromaticitySystem;
use crate::error::{Result, VisionError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Gamma decoding applied before the XYZ transform.
    pub gamma: GammaPolicy,
    /// RGB → XYZ basis.
    pub xyz_matrix: XyzMatrix,
    /// Pixels below this HSB saturation get hue 0.
    pub hue_saturation_threshold: f64,
    /// Box the image is fitted into before building the hue matrix.
    /// `None` builds it at full resolution.
    pub hue_matrix_size: Option<(u32, u32)>,
    pub compressed_rows: usize,
    pub compressed_cols: usize,
    /// Chromaticity system whose mean is written to the aggregate export.
    pub export_chromaticity: ChromaticitySystem,
    /// Lattice size of the live hue grid.
    pub live_grid_size: u32,
    /// Row bands for the parallel pipeline; `None` uses one per CPU.
    pub workers: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            gamma: GammaPolicy::PowerLaw,
            xyz_matrix: XyzMatrix::CieE,
            hue_saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
            hue_matrix_size: Some((100, 100)),
            compressed_rows: 10,
            compressed_cols: 10,
            export_chromaticity: ChromaticitySystem::CieXy,
            live_grid_size: 5,
            workers: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)
            .map_err(|err| VisionError::Config(format!("invalid configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|err| VisionError::Config(format!("cannot read {}: {err}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.hue_saturation_threshold) {
            return Err(VisionError::Config(format!(
                "hue_saturation_threshold {} is outside [0, 1]",
                self.hue_saturation_threshold
            )));
        }
        if let Some((width, height)) = self.hue_matrix_size {
            if width == 0 || height == 0 {
                return Err(VisionError::Config(
                    "hue_matrix_size must be non-zero".to_string(),
                ));
            }
        }
        if self.compressed_rows == 0 || self.compressed_cols == 0 {
            return Err(VisionError::Config(
                "compressed grid must be at least 1x1".to_string(),
            ));
        }
        if self.live_grid_size == 0 {
            return Err(VisionError::Config("live_grid_size must be at least 1".to_string()));
        }
        if self.workers == Some(0) {
            return Err(VisionError::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.gamma, GammaPolicy::PowerLaw);
        assert_eq!(config.xyz_matrix, XyzMatrix::CieE);
    }

    #[test]
    fn policies_are_selectable() {
        let json = r#"{
            "gamma": "PiecewiseSrgb",
            "xyz_matrix": "SrgbD65",
            "hue_matrix_size": null,
            "workers": 3
        }"#;
        let config = PipelineConfig::from_json_str(json).unwrap();
        assert_eq!(config.gamma, GammaPolicy::PiecewiseSrgb);
        assert_eq!(config.xyz_matrix, XyzMatrix::SrgbD65);
        assert_eq!(config.hue_matrix_size, None);
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(PipelineConfig::from_json_str(r#"{"compressed_rows": 0}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"hue_saturation_threshold": 2.0}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"workers": 0}"#).is_err());
        assert!(PipelineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"live_grid_size": 8}"#).unwrap();
        assert_eq!(PipelineConfig::from_json_file(&path).unwrap().live_grid_size, 8);
        assert!(PipelineConfig::from_json_file(&dir.path().join("absent.json")).is_err());
    }
}
