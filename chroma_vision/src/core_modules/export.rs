//! Export documents handed to an external sharing or file-write sink.
//!
//! Two shapes exist and both are reproduced literally:
//! - the hue matrix as a JSON array of arrays of floats, row-major;
//! - the aggregate record as an object with `"Chromaticity"` (`x`, `y`),
//!   `"RGB"` (`r`, `g`, `b` in 0..=255) and `"Metadata"` (a string).
//!
//! Encoding is pretty-printed JSON with no compression and no version tag.
//! Floats round-trip exactly.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core_modules::color_space::Chromaticity;
use crate::core_modules::matrix::{HueMatrix, Matrix};
use crate::core_modules::statistics::{AggregateStatistics, ChromaticitySystem, RgbSample};
use crate::error::Result;

pub const HUE_MATRIX_FILE_NAME: &str = "HueMetadata.json";
pub const AGGREGATE_FILE_NAME: &str = "export.json";
pub const MISSING_METADATA: &str = "No metadata available";

/// `{}` when no sample could be taken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RgbField {
    Sample(RgbSample),
    Missing {},
}

impl From<Option<RgbSample>> for RgbField {
    fn from(sample: Option<RgbSample>) -> Self {
        match sample {
            Some(sample) => RgbField::Sample(sample),
            None => RgbField::Missing {},
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDocument {
    #[serde(rename = "Chromaticity")]
    pub chromaticity: Chromaticity,
    #[serde(rename = "RGB")]
    pub rgb: RgbField,
    /// Pass-through metadata text, untouched.
    #[serde(rename = "Metadata")]
    pub metadata: String,
}

impl AggregateDocument {
    pub fn new(
        statistics: &AggregateStatistics,
        system: ChromaticitySystem,
        rgb: Option<RgbSample>,
        metadata: Option<&str>,
    ) -> Self {
        Self {
            chromaticity: statistics.chromaticity_for(system).mean,
            rgb: rgb.into(),
            metadata: metadata.unwrap_or(MISSING_METADATA).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportDocument {
    HueMatrix(HueMatrix),
    Aggregate(AggregateDocument),
}

impl ExportDocument {
    /// Conventional file name for this document kind.
    pub fn file_name(&self) -> &'static str {
        match self {
            ExportDocument::HueMatrix(_) => HUE_MATRIX_FILE_NAME,
            ExportDocument::Aggregate(_) => AGGREGATE_FILE_NAME,
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

pub fn encode_hue_matrix(matrix: &HueMatrix) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(matrix)?)
}

/// Parses a nested-array document, rejecting ragged rows.
pub fn decode_hue_matrix(bytes: &[u8]) -> Result<HueMatrix> {
    let rows: Vec<Vec<f64>> = serde_json::from_slice(bytes)?;
    Matrix::from_rows(rows)
}

pub fn encode_aggregate(document: &AggregateDocument) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(document)?)
}

pub fn decode_aggregate(bytes: &[u8]) -> Result<AggregateDocument> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Writes `bytes` to a temporary sibling, then renames it over `path`.
pub fn write_document(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| AGGREGATE_FILE_NAME.to_string());
    let staging = path.with_file_name(format!(".{file_name}.tmp"));

    fs::write(&staging, bytes)?;
    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }
    info!(path = %path.display(), bytes = bytes.len(), "wrote export document");
    Ok(())
}
