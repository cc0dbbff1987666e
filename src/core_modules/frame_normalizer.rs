// THEORY:
// The `frame_normalizer` is the first stage of every capture cycle. The
// camera is mounted at a slight, fixed angle to the chamber, and the raw
// photo includes a margin of chamber wall around the plate tray. This module
// straightens and trims the raw frame so that every downstream RegionSpec can
// be expressed in one canonical, chamber-aligned coordinate system.
//
// Key architectural principles:
// 1.  **In-place Persistence**: the normalized frame replaces the raw file on
//     disk. The raw geometry is never valid input for any other stage, so
//     keeping it around would only invite mistakes.
// 2.  **Fail Before Write**: a frame that cannot be decoded aborts the whole
//     cycle before anything is written. No snippet extracted from a bad frame
//     is meaningful, so there is no partial-success path here.
// 3.  **Canvas-preserving Rotation**: rotation keeps the original canvas
//     size; the corners revealed by the rotation are filled with opaque
//     black. The crop rectangle that usually follows removes them anyway.

use image::Rgba;
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use log::debug;
use std::path::Path;

use crate::config::CropRect;
use crate::error::{Result, VisionError};

/// Rotates the frame at `path` to correct the chamber mount angle, applies
/// the optional crop, and persists the result over the original file.
///
/// A positive `angle_degrees` describes a clockwise physical mount rotation,
/// so the correction applied here is counter-clockwise.
pub fn normalize_frame(path: &Path, angle_degrees: f32, crop: Option<CropRect>) -> Result<()> {
    let frame = image::open(path).map_err(|source| VisionError::FrameLoad {
        path: path.to_path_buf(),
        source,
    })?;
    let mut frame = frame.to_rgba8();

    if angle_degrees != 0.0 {
        // `rotate_about_center` rotates clockwise for positive theta; the
        // mount correction goes the other way.
        let theta = -angle_degrees.to_radians();
        frame = rotate_about_center(&frame, theta, Interpolation::Bilinear, Rgba([0, 0, 0, 255]));
    }

    if let Some(rect) = crop {
        frame = image::imageops::crop_imm(&frame, rect.x, rect.y, rect.width, rect.height)
            .to_image();
    }

    frame.save(path).map_err(|source| VisionError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        "normalized frame {} ({}x{}, correction {:.2} deg)",
        path.display(),
        frame.width(),
        frame.height(),
        angle_degrees
    );
    Ok(())
}
