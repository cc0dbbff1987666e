// THEORY:
// The `parallel_pipeline` module runs the per-plate analysis stage across a
// bounded worker pool. One chamber photo yields N independent plate jobs
// (segmentation dominates the cost), so after the shared preprocessing stage
// the plates fan out onto blocking worker threads and the results fan back
// in, order-aligned with the configured plate list.
//
// Key architectural principles:
// 1.  **Shared Stage Stays Serial**: normalization and snippet extraction
//     mutate the frame and the snippet tree, so they run once, up front, on
//     a single blocking worker. Only the read-only per-plate analysis fans
//     out.
// 2.  **Bounded Concurrency**: a semaphore sized to the host's CPU count
//     caps in-flight plate jobs, so a chamber with many plates cannot
//     oversubscribe the blocking thread pool.
// 3.  **Order In, Order Out**: results are joined in spawn order, never in
//     completion order, so the report stays aligned with the plate list.

use futures::future::join_all;
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::core_modules::color_metrics::calculate_color_metrics;
use crate::error::Result;
use crate::pipeline::{CycleReport, PlateOutcome, PlatePipeline};

/// Concurrent front-end over [`PlatePipeline`]. Cheap to clone; clones share
/// the pipeline and the concurrency budget.
#[derive(Clone)]
pub struct ParallelPipeline {
    pipeline: Arc<PlatePipeline>,
    permits: Arc<Semaphore>,
}

impl ParallelPipeline {
    /// Wraps a pipeline with a worker budget of one job per host CPU.
    pub fn new(pipeline: PlatePipeline) -> Self {
        Self::with_worker_limit(pipeline, num_cpus::get().max(1))
    }

    /// Wraps a pipeline with an explicit cap on concurrent plate jobs.
    pub fn with_worker_limit(pipeline: PlatePipeline, workers: usize) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn pipeline(&self) -> &PlatePipeline {
        &self.pipeline
    }

    /// Processes one chamber photo with the per-plate stage fanned out
    /// across the worker pool. Semantically identical to
    /// [`PlatePipeline::process_capture`].
    pub async fn process_capture(
        &self,
        frame_path: PathBuf,
        captured_at: &str,
    ) -> Result<CycleReport> {
        // --- 1. Shared preprocessing, serial ---
        let pipeline = Arc::clone(&self.pipeline);
        let snippet_paths = tokio::task::spawn_blocking(move || pipeline.prepare_frame(&frame_path))
            .await
            .map_err(join_panic)??;

        // --- 2. Color metrics batch ---
        let paths = snippet_paths.clone();
        let color_metrics = tokio::task::spawn_blocking(move || calculate_color_metrics(&paths))
            .await
            .map_err(join_panic)?;

        // --- 3. Per-plate fan-out ---
        let plate_ids = self.pipeline.config().plate_ids.clone();
        let jobs = plate_ids
            .into_iter()
            .zip(snippet_paths.iter().cloned())
            .zip(color_metrics)
            .map(|((plate, path), color)| self.spawn_plate_job(plate, path, color));

        let plates = join_all(jobs).await;

        Ok(CycleReport {
            chamber: self.pipeline.config().chamber.clone(),
            captured_at: captured_at.to_string(),
            plates,
            snippet_paths,
        })
    }

    async fn spawn_plate_job(
        &self,
        plate: String,
        snippet_path: PathBuf,
        color: Option<crate::pipeline::ColorMetrics>,
    ) -> PlateOutcome {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            // The semaphore is never closed; treat it as a skip anyway.
            Err(e) => {
                warn!("plate {plate} skipped: worker pool unavailable ({e})");
                return PlateOutcome::Skipped {
                    plate,
                    reason: e.to_string(),
                };
            }
        };

        let pipeline = Arc::clone(&self.pipeline);
        let job_plate = plate.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let outcome = pipeline.analyze_snippet(&job_plate, &snippet_path, color);
            drop(permit);
            outcome
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("plate {plate} analysis worker failed: {e}");
                PlateOutcome::Skipped {
                    plate,
                    reason: format!("analysis worker failed: {e}"),
                }
            }
        }
    }
}

fn join_panic(e: tokio::task::JoinError) -> crate::error::VisionError {
    crate::error::VisionError::Io(std::io::Error::other(format!(
        "preprocessing worker failed: {e}"
    )))
}

/// Convenience wrapper used by batch jobs: builds a bounded pool and runs
/// one capture.
pub async fn process_capture_parallel(
    pipeline: PlatePipeline,
    frame_path: &Path,
    captured_at: &str,
) -> Result<CycleReport> {
    ParallelPipeline::new(pipeline)
        .process_capture(frame_path.to_path_buf(), captured_at)
        .await
}
