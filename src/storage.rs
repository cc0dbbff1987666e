// THEORY:
// The `storage` module is the seam between the analysis core and the two
// external collaborators it feeds: the document/object store that keeps the
// chamber's history, and the captioning service that produces a short
// qualitative description of a plate image.
//
// Key architectural principles:
// 1.  **Seams, Not Clients**: the core never talks to a remote service. It
//     produces fully-populated, serializable record values and hands them to
//     whatever implements `StorageSink`. Network clients, retries and
//     authentication live behind the trait, outside this crate.
// 2.  **Explicit Ownership**: a sink is an explicitly owned handle passed by
//     the caller into the upload step. There is no lazily-initialized
//     process-wide connection; acquisition and release bracket a batch of
//     uploads in the caller's scope.
// 3.  **Self-describing Records**: a `CycleRecord` carries everything one
//     capture cycle produced (per-plate snippet references, color metrics,
//     calibrated growth areas and indexed contour point lists), so a sink
//     never needs to reach back into the pipeline.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core_modules::contour::{GrowthContour, Point};

/// Errors crossing the collaborator boundary are opaque to the core.
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// One growth contour, serialized as its ordered boundary points and tagged
/// with its index within the plate's contour list.
#[derive(Debug, Clone, Serialize)]
pub struct ContourRecord {
    pub index: usize,
    pub points: Vec<Point>,
}

impl ContourRecord {
    pub fn from_contours(contours: &[GrowthContour]) -> Vec<Self> {
        contours
            .iter()
            .enumerate()
            .map(|(index, contour)| Self {
                index,
                points: contour.points.clone(),
            })
            .collect()
    }
}

/// Everything one capture cycle produced for one plate. Metric fields are
/// `None` when the snippet failed to decode for that calculator, letting the
/// sink skip just the missing values.
#[derive(Debug, Clone, Serialize)]
pub struct PlateRecord {
    pub plate: String,
    pub snippet_path: PathBuf,
    pub culture: String,
    pub started_at: String,
    pub mean_red_intensity: Option<f64>,
    pub mean_green_intensity: Option<f64>,
    pub mean_blue_intensity: Option<f64>,
    pub object_area: Option<f64>,
    pub growth_area_mm2: Option<f64>,
    pub contours: Vec<ContourRecord>,
    /// Free-text description from the captioning collaborator, if one ran.
    pub caption: Option<String>,
}

/// The full structured output of one capture cycle for one chamber.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    pub chamber: String,
    pub captured_at: String,
    pub substrate: String,
    pub plates: Vec<PlateRecord>,
    /// Time-lapse file reference, when one was assembled this cycle.
    pub timelapse_path: Option<PathBuf>,
}

/// The persistent-store collaborator. Implementations upload binary assets
/// and record structured documents; the core only supplies values and local
/// file references.
pub trait StorageSink {
    /// Records one capture cycle's structured output and uploads the snippet
    /// assets it references.
    fn record_cycle(&mut self, record: &CycleRecord) -> Result<(), CollaboratorError>;

    /// Uploads an assembled time-lapse and associates it with the plate.
    fn upload_timelapse(
        &mut self,
        chamber: &str,
        plate: &str,
        gif_path: &Path,
    ) -> Result<(), CollaboratorError>;
}

/// Context handed to the captioning collaborator alongside the snippet.
#[derive(Debug, Clone, Serialize)]
pub struct CaptionContext {
    pub elapsed_hours: i64,
    pub plate_diameter_mm: f64,
    pub culture: String,
}

/// The qualitative-description collaborator. The returned text is treated as
/// an opaque string and forwarded to storage.
pub trait PlateCaptioner {
    fn caption(
        &self,
        snippet_path: &Path,
        context: &CaptionContext,
    ) -> Result<String, CollaboratorError>;
}
