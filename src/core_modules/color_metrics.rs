// THEORY:
// The `color_metrics` module produces the per-snippet color statistics that
// the growth charts are built from: the mean intensity of each color channel
// and the pixel area covered by live (green-stage) growth.
//
// Key architectural principles:
// 1.  **Whole-image Mean**: the channel means run over every pixel of the
//     snippet, including the transparent corner padding. This is a known,
//     accepted approximation: the padding is a constant fraction of every
//     snippet, so the means stay comparable across a plate's history.
// 2.  **Hue-band Segmentation**: "colored object" area is defined by an HSV
//     band around green (70-170 degrees of hue, the 35-85 band of OpenCV's
//     0-180 hue scale the system was originally tuned with), with minimum
//     saturation and value of 100/255 so gray and near-black pixels never
//     qualify. The band mask is lightly smoothed, its connected regions are
//     boundary-traced, and the polygon areas are summed.
// 3.  **Batch Tolerance**: snippets are processed as a batch, and a snippet
//     that fails to decode yields a `None` slot rather than aborting the
//     batch. The storage collaborator can then skip just the failed plate.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use log::warn;
use std::path::Path;

use crate::core_modules::contour::trace_external_contours;

/// Minimum saturation and value (0..=1) for a pixel to count as colored
/// growth, equivalent to 100/255 in 8-bit terms.
const MIN_SATURATION: f32 = 100.0 / 255.0;
const MIN_VALUE: f32 = 100.0 / 255.0;

/// Hue band of live green-stage growth, in degrees.
const HUE_LOW_DEG: f32 = 70.0;
const HUE_HIGH_DEG: f32 = 170.0;

/// Per-snippet color statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMetrics {
    /// Mean red intensity in [0, 255], rounded to 2 decimals.
    pub mean_red: f64,
    /// Mean green intensity in [0, 255], rounded to 2 decimals.
    pub mean_green: f64,
    /// Mean blue intensity in [0, 255], rounded to 2 decimals.
    pub mean_blue: f64,
    /// Total pixel area of connected green-band regions. Non-negative.
    pub object_area: f64,
}

/// Computes color metrics for a batch of snippet files. Each output slot is
/// aligned with its input path; a snippet that cannot be decoded produces
/// `None` and a diagnostic, without failing the rest of the batch.
pub fn calculate_color_metrics<P: AsRef<Path>>(paths: &[P]) -> Vec<Option<ColorMetrics>> {
    paths
        .iter()
        .map(|path| {
            let path = path.as_ref();
            match image::open(path) {
                Ok(img) => Some(metrics_for_image(&img.to_rgba8())),
                Err(e) => {
                    warn!("unable to load snippet {}: {e}", path.display());
                    None
                }
            }
        })
        .collect()
}

/// Computes color metrics for an already-decoded snippet.
pub fn metrics_for_image(image: &RgbaImage) -> ColorMetrics {
    let num_pixels = image.width() as f64 * image.height() as f64;
    if num_pixels == 0.0 {
        return ColorMetrics {
            mean_red: 0.0,
            mean_green: 0.0,
            mean_blue: 0.0,
            object_area: 0.0,
        };
    }

    // Channel sums in one pass; u64 accumulators cannot overflow for any
    // realistic snippet size.
    let mut sum_r = 0u64;
    let mut sum_g = 0u64;
    let mut sum_b = 0u64;
    for pixel in image.pixels() {
        sum_r += pixel[0] as u64;
        sum_g += pixel[1] as u64;
        sum_b += pixel[2] as u64;
    }

    ColorMetrics {
        mean_red: round2(sum_r as f64 / num_pixels),
        mean_green: round2(sum_g as f64 / num_pixels),
        mean_blue: round2(sum_b as f64 / num_pixels),
        object_area: green_object_area(image),
    }
}

/// Total polygon area of all connected green-band regions in the snippet.
fn green_object_area(image: &RgbaImage) -> f64 {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let (h, s, v) = rgb_to_hsv(pixel[0], pixel[1], pixel[2]);
        let in_band = (HUE_LOW_DEG..=HUE_HIGH_DEG).contains(&h)
            && s >= MIN_SATURATION
            && v >= MIN_VALUE;
        if in_band {
            mask.put_pixel(x, y, Luma([255]));
        }
    }

    // Light smoothing knocks out single-pixel speckle before tracing.
    let smoothed = gaussian_blur_f32(&mask, 0.8);

    trace_external_contours(&smoothed)
        .iter()
        .map(|c| c.pixel_area)
        .sum()
}

/// RGB (0..=255 per channel) to HSV with hue in degrees [0, 360) and
/// saturation/value in [0, 1].
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    (hue, saturation, max)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
