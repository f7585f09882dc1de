//! Error types shared by every stage of the analysis engine.
//!
//! Per-pixel degenerate cases (black pixels, zero-sum chromaticity divides)
//! are never errors; they are resolved locally by the conversion policies.
//! The variants here cover whole-call failures only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    /// The pixel buffer could not be obtained from the source.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The image produced no valid pixels to aggregate.
    #[error("Image contains no valid pixels")]
    EmptyImage,

    /// Writing an export document failed.
    #[error("Export I/O error: {0}")]
    ExportIo(#[from] std::io::Error),

    /// Encoding or parsing an export document failed.
    #[error("Export format error: {0}")]
    ExportFormat(#[from] serde_json::Error),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A background worker panicked or was cancelled before finishing.
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for VisionError {
    fn from(err: tokio::task::JoinError) -> Self {
        VisionError::Worker(err.to_string())
    }
}

impl From<image::ImageError> for VisionError {
    fn from(err: image::ImageError) -> Self {
        VisionError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;
