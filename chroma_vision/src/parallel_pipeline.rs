// THEORY:
// The parallel pipeline is a performance wrapper around `AnalysisPipeline` for
// hosts that dispatch analysis off their UI thread. It never changes what is
// computed, only where:
// 1.  **Row bands**: the image is split into contiguous row ranges, one blocking
//     task per band, each filling its own fresh accumulator.
// 2.  **Ordered reduction**: partial accumulators are merged strictly in band
//     order. For a fixed worker count the result is deterministic; compared with
//     the sequential pass it may differ in the last floating-point bits because
//     the summation order differs.
// 3.  **Live session**: camera frames are pushed into a bounded queue and a
//     background task keeps the newest live hue grid in a watch channel, from
//     which the caller can take snapshots at any time.
//
// Nothing is pooled or cached between calls.

use std::ops::Range;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::core_modules::pixel_sampler::RasterImage;
use crate::core_modules::statistics::{AggregateAccumulator, extract_rgb};
use crate::error::{Result, VisionError};
use crate::pipeline::{AnalysisPipeline, AnalysisResult, HueMatrix};

/// Splits `height` rows into at most `workers` contiguous, non-empty bands.
pub fn row_bands(height: u32, workers: usize) -> Vec<Range<u32>> {
    let workers = workers.max(1) as u32;
    let band_height = height.div_ceil(workers).max(1);
    (0..height)
        .step_by(band_height as usize)
        .map(|start| start..(start + band_height).min(height))
        .collect()
}

pub struct ParallelPipeline {
    pipeline: AnalysisPipeline,
    workers: usize,
}

impl ParallelPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let workers = config.worker_count();
        Ok(Self {
            pipeline: AnalysisPipeline::new(config)?,
            workers,
        })
    }

    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.pipeline
    }

    /// Same result as [`AnalysisPipeline::analyze_with_metadata`], computed on
    /// blocking workers.
    pub async fn analyze(
        &self,
        image: Arc<RasterImage>,
        metadata: Option<String>,
    ) -> Result<AnalysisResult> {
        let bands = row_bands(image.height(), self.workers);
        debug!(bands = bands.len(), height = image.height(), "dispatching row bands");

        let engine = self.pipeline.aggregate_engine();
        let band_tasks = bands.into_iter().map(|rows| {
            let image = Arc::clone(&image);
            tokio::task::spawn_blocking(move || engine.accumulate_rows(&image, rows))
        });

        let hue_task = {
            let image = Arc::clone(&image);
            let builder = self.pipeline.hue_builder();
            tokio::task::spawn_blocking(move || builder.build(&image))
        };

        let mut accumulator = AggregateAccumulator::default();
        for partial in join_all(band_tasks).await {
            accumulator.merge(&partial?);
        }
        let hue_matrix = hue_task.await??;

        self.pipeline
            .assemble(accumulator.finish(), extract_rgb(&image), hue_matrix, metadata)
    }
}

/// A running live-preview worker. Both halves are `None` once stopped.
pub struct LiveSession {
    frame_tx: Option<mpsc::Sender<RasterImage>>,
    grid_rx: watch::Receiver<Option<HueMatrix>>,
    worker: Option<JoinHandle<()>>,
}

impl LiveSession {
    /// Spawns the worker on the current tokio runtime. At most `capacity`
    /// frames wait in the queue.
    pub fn start(pipeline: AnalysisPipeline, capacity: usize) -> Self {
        let (frame_tx, mut frame_rx) = mpsc::channel::<RasterImage>(capacity.max(1));
        let (grid_tx, grid_rx) = watch::channel::<Option<HueMatrix>>(None);

        let worker = tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                match pipeline.live_hue_grid(&frame) {
                    Ok(grid) => {
                        grid_tx.send_replace(Some(grid));
                    }
                    Err(err) => warn!(%err, "skipping live frame"),
                }
            }
        });

        Self {
            frame_tx: Some(frame_tx),
            grid_rx,
            worker: Some(worker),
        }
    }

    /// Queues a frame without waiting. Returns `false` and drops the frame when
    /// the queue is full or the session has stopped.
    pub fn submit(&self, frame: RasterImage) -> bool {
        let Some(frame_tx) = &self.frame_tx else {
            warn!("live session stopped, dropping frame");
            return false;
        };
        match frame_tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("live frame queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("live worker stopped, dropping frame");
                false
            }
        }
    }

    /// Waits until a newer live grid is available.
    pub async fn changed(&mut self) -> Result<()> {
        self.grid_rx
            .changed()
            .await
            .map_err(|_| VisionError::Worker("live worker stopped".to_string()))
    }

    /// A copy of the newest live grid, detached from further updates.
    pub fn snapshot(&self) -> Option<HueMatrix> {
        self.grid_rx.borrow().clone()
    }

    /// Closes the queue and waits for queued frames to drain. The last grid
    /// stays available through [`LiveSession::snapshot`].
    pub async fn stop(&mut self) -> Result<()> {
        drop(self.frame_tx.take());
        if let Some(worker) = self.worker.take() {
            worker.await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel_sampler::ChannelLayout;
    use approx::assert_abs_diff_eq;

    fn noisy(width: u32, height: u32) -> RasterImage {
        let mut data = Vec::new();
        for i in 0..(width * height) {
            data.extend_from_slice(&[
                (i * 29 % 256) as u8,
                (i * 57 % 256) as u8,
                (i * 101 % 256) as u8,
                255,
            ]);
        }
        RasterImage::new(width, height, data).unwrap()
    }

    #[test]
    fn bands_cover_every_row_once() {
        assert_eq!(row_bands(10, 3), vec![0..4, 4..8, 8..10]);
        assert_eq!(row_bands(2, 8), vec![0..1, 1..2]);
        assert!(row_bands(0, 4).is_empty());
        let total: u32 = row_bands(1001, 7).iter().map(|r| r.end - r.start).sum();
        assert_eq!(total, 1001);
    }

    #[tokio::test]
    async fn parallel_matches_sequential() {
        let config = PipelineConfig {
            workers: Some(4),
            ..PipelineConfig::default()
        };
        let image = Arc::new(noisy(37, 23));
        let parallel = ParallelPipeline::new(config.clone())
            .unwrap()
            .analyze(Arc::clone(&image), Some("meta".to_string()))
            .await
            .unwrap();
        let sequential = AnalysisPipeline::new(config)
            .unwrap()
            .analyze_with_metadata(&image, Some("meta".to_string()))
            .unwrap();

        assert_eq!(parallel.hue_matrix, sequential.hue_matrix);
        assert_eq!(parallel.rgb, sequential.rgb);
        assert_eq!(parallel.metadata, sequential.metadata);
        assert_eq!(
            parallel.aggregate.valid_pixel_count,
            sequential.aggregate.valid_pixel_count
        );
        assert_abs_diff_eq!(
            parallel.aggregate.chromaticity.mean.x,
            sequential.aggregate.chromaticity.mean.x,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            parallel.aggregate.chromaticity.std_dev.y,
            sequential.aggregate.chromaticity.std_dev.y,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            parallel.aggregate.xyz.average.x,
            sequential.aggregate.xyz.average.x,
            epsilon = 1e-12
        );
    }

    #[tokio::test]
    async fn live_session_publishes_grids() {
        let pipeline = AnalysisPipeline::default();
        let mut session = LiveSession::start(pipeline, 4);
        assert_eq!(session.snapshot(), None);

        let frame = RasterImage::with_layout(
            10,
            10,
            40,
            ChannelLayout::Bgra,
            [0u8, 255, 0, 255].repeat(100),
        )
        .unwrap();
        assert!(session.submit(frame));
        session.changed().await.unwrap();

        let snapshot = session.snapshot().unwrap();
        assert_eq!(snapshot.dimensions(), (5, 5));
        for hue in snapshot.values() {
            assert_abs_diff_eq!(hue, 1.0 / 3.0, epsilon = 1e-9);
        }
        session.stop().await.unwrap();
        assert_eq!(session.snapshot(), Some(snapshot));
    }

    fn green_frame() -> RasterImage {
        RasterImage::new(10, 10, [0u8, 255, 0, 255].repeat(100)).unwrap()
    }

    #[tokio::test]
    async fn full_queue_drops_frames() {
        // The current-thread runtime cannot run the worker until this task
        // yields, so the single slot stays occupied.
        let session = LiveSession::start(AnalysisPipeline::default(), 1);
        assert!(session.submit(green_frame()));
        assert!(!session.submit(green_frame()));
    }

    #[tokio::test]
    async fn stopped_session_rejects_frames() {
        let mut session = LiveSession::start(AnalysisPipeline::default(), 2);
        assert!(session.submit(green_frame()));
        session.stop().await.unwrap();

        // The queued frame was drained before the worker exited.
        assert_eq!(session.snapshot().map(|grid| grid.dimensions()), Some((5, 5)));
        assert!(!session.submit(green_frame()));
        assert!(session.stop().await.is_ok());
    }

    #[tokio::test]
    async fn empty_frames_are_skipped() {
        let mut session = LiveSession::start(AnalysisPipeline::default(), 2);
        assert!(session.submit(RasterImage::new(0, 0, Vec::new()).unwrap()));
        session.stop().await.unwrap();
        assert_eq!(session.snapshot(), None);
    }
}
