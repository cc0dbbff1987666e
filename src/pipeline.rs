// THEORY:
// The `pipeline` module is the top-level API for one capture cycle. It
// encapsulates the full analysis stack into a single entry point that takes
// one chamber photo and returns one structured report covering every plate.
//
// Key architectural principles:
// 1.  **Shared Preprocessing First**: the frame must be normalized before
//     regions are cut, and regions must be cut before any per-plate work. A
//     failure in this shared stage aborts the cycle; nothing downstream of a
//     bad frame is meaningful.
// 2.  **Per-plate Isolation**: once snippets exist, each plate is analyzed
//     independently. A plate whose snippet cannot be processed becomes a
//     skip outcome with a human-readable diagnostic; its siblings are
//     unaffected.
// 3.  **Values Out, Uploads Elsewhere**: the pipeline produces a
//     `CycleReport` and can translate it into the storage record shape, but
//     it never owns a storage connection. The caller passes its own sink to
//     whatever upload step it runs afterwards.

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::ChamberConfig;
use crate::core_modules::area_calibrator::total_area_mm2;
use crate::core_modules::color_metrics::calculate_color_metrics;
use crate::core_modules::contour_detector::detect_growth_contours;
use crate::core_modules::frame_normalizer::normalize_frame;
use crate::core_modules::region_extractor::cut_circle_snippets;
use crate::core_modules::timelapse::{TimelapseOptions, TimelapseOutcome, assemble_timelapse};
use crate::error::Result;
use crate::storage::{ContourRecord, CycleRecord, PlateRecord};

// Re-export key data structures for the public API.
pub use crate::core_modules::color_metrics::ColorMetrics;
pub use crate::core_modules::contour::GrowthContour;
pub use crate::core_modules::contour_detector::DetectorConfig;

/// Everything the analysis produced for one plate in one cycle.
#[derive(Debug, Clone)]
pub struct PlateAnalysis {
    pub plate: String,
    pub snippet_path: PathBuf,
    /// Channel means and colored-object area; `None` when the snippet failed
    /// to decode for the color calculator.
    pub color: Option<ColorMetrics>,
    /// Filtered growth contours, in boundary-tracing discovery order.
    pub contours: Vec<GrowthContour>,
    /// Total calibrated growth area in square millimetres.
    pub growth_area_mm2: f64,
}

/// The per-plate result of a cycle: either a full analysis or a diagnosed
/// skip. Skips never abort sibling plates.
#[derive(Debug, Clone)]
pub enum PlateOutcome {
    Analyzed(PlateAnalysis),
    Skipped { plate: String, reason: String },
}

/// The primary output of one capture cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub chamber: String,
    pub captured_at: String,
    /// Per-plate outcomes, order-aligned with the configured plate list.
    pub plates: Vec<PlateOutcome>,
    /// Snippet paths written this cycle, order-aligned with the plate list.
    pub snippet_paths: Vec<PathBuf>,
}

/// The main, top-level struct for the plate analysis engine.
#[derive(Debug, Clone)]
pub struct PlatePipeline {
    config: ChamberConfig,
    detector: DetectorConfig,
    /// Root under which the `{chamber}/{plate}/` snippet trees live.
    output_root: PathBuf,
}

impl PlatePipeline {
    /// Builds a pipeline from a chamber config, validating sequence
    /// alignment (and broadcasting single shared values) up front.
    pub fn new(config: ChamberConfig, output_root: impl Into<PathBuf>) -> Result<Self> {
        let config = config.validate_and_broadcast()?;
        Ok(Self {
            config,
            detector: DetectorConfig::default(),
            output_root: output_root.into(),
        })
    }

    /// Overrides the growth-detector tunables.
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &ChamberConfig {
        &self.config
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Processes one chamber photo end to end: normalize, extract one
    /// snippet per plate, then analyze every plate.
    ///
    /// `captured_at` is the acquisition timestamp, carried through to the
    /// report and storage records untouched.
    pub fn process_capture(&self, frame_path: &Path, captured_at: &str) -> Result<CycleReport> {
        let snippet_paths = self.prepare_frame(frame_path)?;

        // Color metrics run as one batch; a failed snippet yields a None
        // slot rather than poisoning the cycle.
        let color_metrics = calculate_color_metrics(&snippet_paths);

        let plates = self
            .config
            .plate_ids
            .iter()
            .zip(snippet_paths.iter())
            .zip(color_metrics)
            .map(|((plate, path), color)| self.analyze_snippet(plate, path, color))
            .collect();

        Ok(CycleReport {
            chamber: self.config.chamber.clone(),
            captured_at: captured_at.to_string(),
            plates,
            snippet_paths,
        })
    }

    /// The shared preprocessing stage: normalizes the frame in place and
    /// cuts one circular snippet per configured region. Any failure here
    /// aborts the cycle.
    pub fn prepare_frame(&self, frame_path: &Path) -> Result<Vec<PathBuf>> {
        normalize_frame(
            frame_path,
            self.config.rotation_angle_degrees,
            self.config.crop,
        )?;
        cut_circle_snippets(
            frame_path,
            &self.config.regions,
            &self.config.plate_ids,
            &self.config.chamber,
            &self.output_root,
        )
    }

    /// Analyzes one plate's snippet: growth contours plus calibrated area,
    /// bundled with the already-computed color metrics. Failures become a
    /// skip outcome for this plate only.
    pub fn analyze_snippet(
        &self,
        plate: &str,
        snippet_path: &Path,
        color: Option<ColorMetrics>,
    ) -> PlateOutcome {
        match detect_growth_contours(snippet_path, &self.detector) {
            Ok(contours) => {
                let growth_area_mm2 = total_area_mm2(&contours, &self.config.calibration);
                info!(
                    "plate {plate}: {} contour(s), {growth_area_mm2} mm^2 of growth",
                    contours.len()
                );
                PlateOutcome::Analyzed(PlateAnalysis {
                    plate: plate.to_string(),
                    snippet_path: snippet_path.to_path_buf(),
                    color,
                    contours,
                    growth_area_mm2,
                })
            }
            Err(e) => {
                warn!("plate {plate} skipped this cycle: {e}");
                PlateOutcome::Skipped {
                    plate: plate.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Assembles the time-lapse for one plate from its accumulated snippet
    /// history under the pipeline's output root.
    pub fn assemble_plate_timelapse(
        &self,
        plate: &str,
        options: &TimelapseOptions,
    ) -> TimelapseOutcome {
        let input_dir = self.output_root.join(&self.config.chamber).join(plate);
        assemble_timelapse(&input_dir, &format!("{plate}.gif"), options)
    }

    /// Translates a report into the storage record shape, joining in the
    /// per-plate configuration metadata (culture labels, start times).
    pub fn record_for(&self, report: &CycleReport) -> CycleRecord {
        let plates = report
            .plates
            .iter()
            .enumerate()
            .filter_map(|(i, outcome)| match outcome {
                PlateOutcome::Analyzed(analysis) => Some(PlateRecord {
                    plate: analysis.plate.clone(),
                    snippet_path: analysis.snippet_path.clone(),
                    culture: self.config.cultures[i].clone(),
                    started_at: self.config.plate_start_times[i].clone(),
                    mean_red_intensity: analysis.color.as_ref().map(|c| c.mean_red),
                    mean_green_intensity: analysis.color.as_ref().map(|c| c.mean_green),
                    mean_blue_intensity: analysis.color.as_ref().map(|c| c.mean_blue),
                    object_area: analysis.color.as_ref().map(|c| c.object_area),
                    growth_area_mm2: Some(analysis.growth_area_mm2),
                    contours: ContourRecord::from_contours(&analysis.contours),
                    caption: None,
                }),
                PlateOutcome::Skipped { .. } => None,
            })
            .collect();

        CycleRecord {
            chamber: report.chamber.clone(),
            captured_at: report.captured_at.clone(),
            substrate: self.config.substrate.clone(),
            plates,
            timelapse_path: None,
        }
    }
}
