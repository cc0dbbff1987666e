// THEORY:
// The `area_calibrator` converts pixel-space contour areas into physical
// units. A snippet of a known physical diameter spans a known number of
// pixels, so lengths scale by `diameter_mm / diameter_px` and areas by that
// factor squared. This is the only place in the crate where pixels become
// millimetres; everything upstream stays in pixel space.
//
// The operation is deliberately total: an empty contour list is a plate with
// no detected growth, and its calibrated area is exactly 0.0, not an error.

use crate::config::CalibrationReference;
use crate::core_modules::contour::GrowthContour;

/// Total growth area of all contours in square millimetres, rounded to 2
/// decimal places. Empty input yields exactly 0.0.
pub fn total_area_mm2(contours: &[GrowthContour], reference: &CalibrationReference) -> f64 {
    if contours.is_empty() {
        return 0.0;
    }

    let mm2_per_px2 = reference.factor() * reference.factor();
    let total: f64 = contours.iter().map(|c| c.pixel_area * mm2_per_px2).sum();
    (total * 100.0).round() / 100.0
}
