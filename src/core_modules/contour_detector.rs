// THEORY:
// The `contour_detector` is the engine of the growth-quantification layer. It
// segments dark mycelium growth on a bright agar plate into a filtered set of
// closed contours, and it is where all the optics-versus-biology judgement
// calls live.
//
// Key architectural principles & algorithm steps:
// 1.  **Alpha-aware Preprocessing**: a snippet's transparent pixels are not
//     plate. They are forced to background white before thresholding so they
//     can never register as growth, and re-zeroed afterwards so the boundary
//     between valid and invalid pixels never becomes foreground either.
// 2.  **Local-mean Thresholding**: growth is darker than the agar around it,
//     but the absolute brightness varies across the plate (lighting falloff,
//     condensation). A local-mean adaptive threshold (window ~41 px, offset
//     5) tracks that variation where a global threshold would not.
// 3.  **Morphological Opening**: an elliptical opening removes speckle noise
//     left by the threshold while preserving the shape of connected blobs.
// 4.  **External Boundary Tracing**: only the outermost boundary of each
//     connected region matters for area; holes inside a colony are part of
//     the colony.
// 5.  **Rim and Corner Suppression**: plate snippets are circles inscribed in
//     squares. The circle's rim (container wall, glare) and the square's
//     corners (cropping discontinuities) produce dark artifacts that are not
//     biology. Candidates are rejected when their centroid leaves the safe
//     circle, when ANY boundary point leaves it (catching contours that
//     bulge toward the rim), or when their bounding box hugs a snippet edge.
// 6.  **Stateless Utility**: detection takes one snippet and its tunables and
//     returns contours for that snippet. It holds no state between calls.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::filter::{box_filter, gaussian_blur_f32};
use imageproc::distance_transform::Norm;
use imageproc::morphology::open;
use log::debug;
use std::path::Path;

use crate::core_modules::contour::{GrowthContour, trace_external_contours};
use crate::error::{Result, VisionError};

/// Tunable parameters for growth segmentation. The defaults are what the
/// six-plate reference chamber is tuned with.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// Minimum contour pixel area; anything smaller is noise.
    pub min_area: f64,
    /// Fraction of `min(half_width, half_height)` considered safely inside
    /// the plate; contours reaching beyond it are rim artifacts.
    pub safe_radius_ratio: f64,
    /// Minimum distance between a contour's bounding box and any snippet
    /// edge, in pixels.
    pub bbox_margin: i32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_area: 300.0,
            safe_radius_ratio: 0.87,
            bbox_margin: 10,
        }
    }
}

/// Local-mean threshold window radius (window of ~41 px).
const THRESHOLD_WINDOW_RADIUS: u32 = 20;
/// Offset subtracted from the local mean; a pixel must be at least this much
/// darker than its neighbourhood to count as growth.
const THRESHOLD_OFFSET: i16 = 5;
/// Sigma of the denoising blur applied before thresholding.
const DENOISE_SIGMA: f32 = 1.1;
/// Radius of the elliptical opening (two passes of a 5x5 ellipse).
const OPENING_RADIUS: u8 = 4;

/// Detects growth contours in the snippet at `path`.
///
/// Fails with a not-found/load error when the snippet is missing or
/// undecodable; callers must not attempt area calibration after a failed
/// detection.
pub fn detect_growth_contours(path: &Path, config: &DetectorConfig) -> Result<Vec<GrowthContour>> {
    if !path.exists() {
        return Err(VisionError::SnippetNotFound(path.to_path_buf()));
    }
    let image = image::open(path).map_err(|source| VisionError::SnippetLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let contours = detect_in_image(&image.to_rgba8(), config);
    debug!(
        "detected {} growth contour(s) in {}",
        contours.len(),
        path.display()
    );
    Ok(contours)
}

/// Detects growth contours in an already-decoded snippet.
pub fn detect_in_image(image: &RgbaImage, config: &DetectorConfig) -> Vec<GrowthContour> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    // --- 1. Grayscale with invalid pixels forced to background ---
    let mut gray = image::imageops::grayscale(image);
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            gray.put_pixel(x, y, Luma([255]));
        }
    }

    // --- 2. Mild denoising blur ---
    let blurred = gaussian_blur_f32(&gray, DENOISE_SIGMA);

    // --- 3. Local-mean adaptive threshold, inverted for dark objects ---
    let local_mean = box_filter(&blurred, THRESHOLD_WINDOW_RADIUS, THRESHOLD_WINDOW_RADIUS);
    let mut binary = GrayImage::new(width, height);
    for (x, y, pixel) in blurred.enumerate_pixels() {
        let mean = local_mean.get_pixel(x, y)[0] as i16;
        if (pixel[0] as i16) <= mean - THRESHOLD_OFFSET {
            binary.put_pixel(x, y, Luma([255]));
        }
    }

    // Re-zero invalid pixels: the step between forced-white padding and the
    // plate interior must not survive as foreground.
    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] == 0 {
            binary.put_pixel(x, y, Luma([0]));
        }
    }

    // --- 4. Morphological opening to drop speckle noise ---
    let clean = open(&binary, Norm::L2, OPENING_RADIUS);

    // --- 5. External boundary tracing ---
    let candidates = trace_external_contours(&clean);

    // --- 6. Edge/corner artifact filtering ---
    filter_contours(candidates, width, height, config)
}

/// Applies the size, centroid, all-points and bounding-box rejection rules.
/// Exposed separately from the raster stages so the geometry rules can be
/// exercised on synthetic contours.
pub fn filter_contours(
    candidates: Vec<GrowthContour>,
    width: u32,
    height: u32,
    config: &DetectorConfig,
) -> Vec<GrowthContour> {
    let center_x = (width / 2) as f64;
    let center_y = (height / 2) as f64;
    let safe_radius = ((width / 2).min(height / 2) as f64 * config.safe_radius_ratio).floor();
    let snippet_area = width as f64 * height as f64;
    let margin = config.bbox_margin;

    candidates
        .into_iter()
        .filter(|contour| {
            if contour.pixel_area < config.min_area {
                return false;
            }
            // A contour covering more than a quarter of the snippet is a
            // background-segmentation failure, not a colony.
            if contour.pixel_area > 0.25 * snippet_area {
                return false;
            }

            // Zero-area moment: silently dropped, not an error.
            let Some((cx, cy)) = contour.centroid else {
                return false;
            };
            let centroid_dist = ((cx - center_x).powi(2) + (cy - center_y).powi(2)).sqrt();
            if centroid_dist > safe_radius {
                return false;
            }

            // Stricter than centroid-only filtering: any boundary point
            // reaching past the safe circle disqualifies the contour.
            if contour.max_distance_from(center_x, center_y) > safe_radius {
                return false;
            }

            let bb = contour.bounding_box;
            if bb.min_x < margin
                || bb.min_y < margin
                || bb.max_x >= width as i32 - margin
                || bb.max_y >= height as i32 - margin
            {
                return false;
            }

            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::contour::Point;
    use image::Rgba;

    /// Builds a circular plate snippet: bright agar inside the inscribed
    /// circle, transparent outside, with optional dark blocks painted on.
    fn synthetic_snippet(side: u32, blobs: &[(u32, u32, u32)]) -> RgbaImage {
        let r = (side / 2) as i64;
        let mut image = RgbaImage::new(side, side);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let dx = x as i64 - r;
            let dy = y as i64 - r;
            if dx * dx + dy * dy <= r * r {
                *pixel = Rgba([235, 230, 220, 255]);
            }
        }
        for &(bx, by, size) in blobs {
            for y in by..by + size {
                for x in bx..bx + size {
                    if x < side && y < side {
                        let p = image.get_pixel(x, y);
                        if p[3] > 0 {
                            image.put_pixel(x, y, Rgba([40, 35, 30, 255]));
                        }
                    }
                }
            }
        }
        image
    }

    fn square_contour(x0: i32, y0: i32, side: i32) -> GrowthContour {
        GrowthContour::from_points(vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ])
        .expect("contour")
    }

    #[test]
    fn central_dark_blob_is_detected() {
        // 30x30 dark block centered on a 200x200 plate.
        let image = synthetic_snippet(200, &[(85, 85, 30)]);
        let contours = detect_in_image(&image, &DetectorConfig::default());
        assert_eq!(contours.len(), 1, "expected exactly one growth contour");
        assert!(contours[0].pixel_area >= 300.0);
        let (cx, cy) = contours[0].centroid.expect("centroid");
        assert!((cx - 100.0).abs() < 5.0);
        assert!((cy - 100.0).abs() < 5.0);
    }

    #[test]
    fn clean_plate_yields_no_contours() {
        let image = synthetic_snippet(200, &[]);
        let contours = detect_in_image(&image, &DetectorConfig::default());
        assert!(contours.is_empty());
    }

    #[test]
    fn blob_bulging_past_the_safe_radius_is_rejected() {
        // Centroid distance ~80 is inside safe_radius 87, but the far corner
        // of the block reaches past it.
        let image = synthetic_snippet(200, &[(170, 90, 20)]);
        let contours = detect_in_image(&image, &DetectorConfig::default());
        assert!(contours.is_empty());
    }

    #[test]
    fn filter_rejects_centroids_outside_the_safe_radius() {
        let config = DetectorConfig::default();
        // safe_radius = floor(100 * 0.87) = 87; this square sits at the rim.
        let rim = square_contour(150, 150, 30);
        let kept = filter_contours(vec![rim], 200, 200, &config);
        assert!(kept.is_empty());
    }

    #[test]
    fn filter_rejects_any_boundary_point_outside_the_safe_radius() {
        let config = DetectorConfig::default();
        // Centroid at (100, 140) is 40 px from center, well inside the safe
        // circle, but the bottom corners reach past it.
        let bulging = square_contour(60, 100, 80); // corners reach (140, 180)
        let centroid = bulging.centroid.expect("centroid");
        let centroid_dist =
            ((centroid.0 - 100.0).powi(2) + (centroid.1 - 100.0).powi(2)).sqrt();
        assert!(centroid_dist <= 87.0, "test premise: centroid inside");
        assert!(bulging.max_distance_from(100.0, 100.0) > 87.0);

        let kept = filter_contours(vec![bulging], 200, 200, &config);
        assert!(kept.is_empty());
    }

    #[test]
    fn filter_rejects_boxes_hugging_the_snippet_edge() {
        let config = DetectorConfig {
            // Defuse the radius rules so only the bbox rule can fire.
            safe_radius_ratio: 10.0,
            ..DetectorConfig::default()
        };
        let edge_hugger = square_contour(2, 80, 40);
        let kept = filter_contours(vec![edge_hugger], 200, 200, &config);
        assert!(kept.is_empty());
    }

    #[test]
    fn filter_rejects_small_and_oversized_areas() {
        let config = DetectorConfig::default();
        let tiny = square_contour(90, 90, 10); // 100 px < 300
        let huge = square_contour(30, 30, 140); // 19600 px > 25% of 40000
        let ok = square_contour(85, 85, 30);
        let kept = filter_contours(vec![tiny, huge, ok], 200, 200, &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].pixel_area, 900.0);
    }

    #[test]
    fn missing_snippet_raises_not_found() {
        let err = detect_growth_contours(
            Path::new("/no/such/snippet.png"),
            &DetectorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VisionError::SnippetNotFound(_)));
    }
}
