// THEORY:
// The `timelapse` module turns a plate's accumulated snippet history into an
// annotated, looping animated image. It is the only component that works on
// a plate's whole lifetime instead of a single capture, and it rebuilds that
// lifetime from directory contents on every invocation. The filesystem is
// the source of truth, not any long-lived in-process state.
//
// Key architectural principles:
// 1.  **Rediscovery over Bookkeeping**: the sequence is re-derived from the
//     snippet directory each time. Files whose names carry no parseable
//     capture timestamp are excluded with a diagnostic; they never poison
//     the ordering of the rest.
// 2.  **Skip, Don't Fail**: a missing directory, an empty directory, or a
//     render problem yields a typed skip outcome with a human-readable
//     reason. One plate's missing history must never abort a capture cycle.
// 3.  **Elapsed-time Annotation**: each frame is stamped with the whole
//     hours elapsed since the first kept frame, so the animation reads as a
//     growth record rather than a slideshow. A bundled font backs the
//     overlay, so it renders out of the box; a configured font path
//     overrides it, falling back to the bundled one when unloadable.

use ab_glyph::{FontVec, PxScale};
use chrono::NaiveDateTime;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba};
use imageproc::drawing::draw_text_mut;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::core_modules::timestamp::parse_capture_timestamp;

/// Filename extensions considered part of a plate's snippet history.
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// Bundled annotation font (DejaVu Sans, Bitstream Vera license).
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Tunables for one time-lapse render.
#[derive(Debug, Clone)]
pub struct TimelapseOptions {
    /// Target frame width in pixels; height follows the aspect ratio.
    pub frame_width: u32,
    /// Display duration of each frame, in seconds.
    pub frame_duration_secs: f64,
    /// Keep every `stride`-th snippet; values below 1 are treated as 1.
    pub stride: usize,
    /// TrueType font used for the elapsed-hours overlay. `None` (or an
    /// unloadable file) falls back to the bundled font.
    pub font_path: Option<PathBuf>,
}

impl Default for TimelapseOptions {
    fn default() -> Self {
        Self {
            frame_width: 200,
            frame_duration_secs: 0.1,
            stride: 10,
            font_path: None,
        }
    }
}

/// One (capture time, snippet file) pair of a plate's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSeriesEntry {
    pub captured_at: NaiveDateTime,
    pub path: PathBuf,
}

/// Why no time-lapse was produced this cycle. All of these mean "skip this
/// plate's time-lapse", not "abort the pipeline".
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("input directory does not exist: {0}")]
    MissingDirectory(PathBuf),
    #[error("no image files found in {0}")]
    NoImageFiles(PathBuf),
    #[error("no file in {0} carries a parseable capture timestamp")]
    NoParseableTimestamps(PathBuf),
    #[error("render failed: {0}")]
    RenderFailed(String),
}

/// The result of one assembly attempt.
#[derive(Debug)]
pub enum TimelapseOutcome {
    /// The animated sequence was written to this path.
    Written(PathBuf),
    /// Nothing was written; the reason says why.
    Skipped(SkipReason),
}

/// Builds the ordered capture history of one plate from its snippet
/// directory. Files without a parseable timestamp are excluded (with a
/// diagnostic), and the result is sorted ascending by capture time
/// regardless of directory listing order.
pub fn scan_time_series(input_dir: &Path) -> Result<Vec<TimeSeriesEntry>, SkipReason> {
    if !input_dir.is_dir() {
        return Err(SkipReason::MissingDirectory(input_dir.to_path_buf()));
    }

    let mut image_files = Vec::new();
    let read = std::fs::read_dir(input_dir)
        .map_err(|e| SkipReason::RenderFailed(format!("cannot list {}: {e}", input_dir.display())))?;
    for entry in read.flatten() {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image {
            image_files.push(path);
        }
    }

    if image_files.is_empty() {
        return Err(SkipReason::NoImageFiles(input_dir.to_path_buf()));
    }

    let mut entries = Vec::with_capacity(image_files.len());
    for path in image_files {
        let filename = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        match parse_capture_timestamp(&filename) {
            Ok(captured_at) => entries.push(TimeSeriesEntry { captured_at, path }),
            Err(e) => warn!("excluding {filename} from time-lapse: {e}"),
        }
    }

    if entries.is_empty() {
        return Err(SkipReason::NoParseableTimestamps(input_dir.to_path_buf()));
    }

    entries.sort_by_key(|entry| entry.captured_at);
    Ok(entries)
}

/// Elapsed whole hours between two capture times, rounded to the nearest
/// hour.
pub fn elapsed_hours(start: NaiveDateTime, current: NaiveDateTime) -> i64 {
    let seconds = (current - start).num_seconds() as f64;
    (seconds / 3600.0).round() as i64
}

/// Assembles the plate history under `input_dir` into a looping animated GIF
/// named `output_name`, written to an `output_gif_folder` directory next to
/// the chamber's capture tree (the input directory's grandparent).
pub fn assemble_timelapse(
    input_dir: &Path,
    output_name: &str,
    options: &TimelapseOptions,
) -> TimelapseOutcome {
    let entries = match scan_time_series(input_dir) {
        Ok(entries) => entries,
        Err(reason) => {
            warn!("time-lapse skipped for {}: {reason}", input_dir.display());
            return TimelapseOutcome::Skipped(reason);
        }
    };

    let stride = options.stride.max(1);
    let kept: Vec<&TimeSeriesEntry> = entries.iter().step_by(stride).collect();

    let font = load_font(options.font_path.as_deref());
    let start = kept[0].captured_at;

    match render_gif(&kept, start, font.as_ref(), input_dir, output_name, options) {
        Ok(path) => {
            info!(
                "time-lapse written to {} ({} frame(s), {:.2}s per frame)",
                path.display(),
                kept.len(),
                options.frame_duration_secs
            );
            TimelapseOutcome::Written(path)
        }
        Err(reason) => {
            warn!("time-lapse skipped for {}: {reason}", input_dir.display());
            TimelapseOutcome::Skipped(reason)
        }
    }
}

fn render_gif(
    kept: &[&TimeSeriesEntry],
    start: NaiveDateTime,
    font: Option<&FontVec>,
    input_dir: &Path,
    output_name: &str,
    options: &TimelapseOptions,
) -> Result<PathBuf, SkipReason> {
    let output_dir = input_dir
        .parent()
        .and_then(Path::parent)
        .map(|p| p.join("output_gif_folder"))
        .unwrap_or_else(|| PathBuf::from("output_gif_folder"));
    std::fs::create_dir_all(&output_dir)
        .map_err(|e| SkipReason::RenderFailed(format!("cannot create {}: {e}", output_dir.display())))?;
    let output_path = output_dir.join(output_name);

    let file = std::fs::File::create(&output_path)
        .map_err(|e| SkipReason::RenderFailed(format!("cannot create {}: {e}", output_path.display())))?;
    let mut encoder = GifEncoder::new(file);
    encoder
        .set_repeat(Repeat::Infinite)
        .map_err(|e| SkipReason::RenderFailed(e.to_string()))?;

    let delay = Delay::from_saturating_duration(Duration::from_secs_f64(
        options.frame_duration_secs.max(0.0),
    ));

    for entry in kept {
        let image = image::open(&entry.path)
            .map_err(|e| SkipReason::RenderFailed(format!("{}: {e}", entry.path.display())))?
            .to_rgba8();

        // Resize preserving aspect ratio to the target width.
        let width = options.frame_width.max(1);
        let height =
            ((image.height() as f64 * width as f64 / image.width() as f64).round() as u32).max(1);
        let mut resized =
            image::imageops::resize(&image, width, height, image::imageops::FilterType::Triangle);

        if let Some(font) = font {
            let hours = elapsed_hours(start, entry.captured_at);
            draw_text_mut(
                &mut resized,
                Rgba([255, 255, 255, 255]),
                10,
                10,
                PxScale::from(20.0),
                font,
                &format!("{hours} hours"),
            );
        }

        encoder
            .encode_frame(Frame::from_parts(resized, 0, 0, delay))
            .map_err(|e| SkipReason::RenderFailed(e.to_string()))?;
    }

    Ok(output_path)
}

/// Loads the annotation font: the configured one when readable, the bundled
/// one otherwise. Returns `None` only if the bundled font itself fails to
/// parse, which skips the overlay rather than failing the render.
fn load_font(path: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = path {
        match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => return Some(font),
                Err(e) => warn!(
                    "annotation font {} is not a valid font ({e}); using the bundled font",
                    path.display()
                ),
            },
            Err(e) => warn!(
                "cannot read annotation font {} ({e}); using the bundled font",
                path.display()
            ),
        }
    }

    match FontVec::try_from_vec(BUNDLED_FONT.to_vec()) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("bundled annotation font failed to parse ({e}); overlay skipped");
            None
        }
    }
}
