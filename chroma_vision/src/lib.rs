// THEORY:
// This file is the main entry point for the `chroma_vision` library crate.
// It defines the public API exposed to host applications (a mobile shell, a
// desktop tester, a batch exporter).
//
// The primary goal is to export `AnalysisPipeline` and its associated data
// structures (`PipelineConfig`, `AnalysisResult`, the export documents) as the
// high-level interface for the whole colorimetric engine. `ParallelPipeline`
// offers the same analysis on blocking workers, plus the live-camera session.
// The `core_modules` stay public so individual conversions can be reused, but
// callers normally only need the pipeline.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::PipelineConfig;
pub use error::{Result, VisionError};
pub use parallel_pipeline::{LiveSession, ParallelPipeline};
pub use pipeline::{AnalysisPipeline, AnalysisResult};
