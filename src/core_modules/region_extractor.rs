// THEORY:
// The `region_extractor` cuts the individual plates out of a normalized
// chamber frame. Each plate occupies a known circular region; everything
// outside the circle (neighbouring plates, tray, chamber wall) is noise for
// the per-plate analysis stages and is removed here, once, rather than
// re-masked by every consumer.
//
// Key architectural principles:
// 1.  **Alpha as Validity**: a snippet is a 2r x 2r square whose corner
//     pixels are fully transparent. Downstream stages (the contour detector
//     in particular) use alpha == 0 as the "not plate" signal, so the
//     extractor must always emit an alpha channel, synthesizing it when the
//     source frame has none.
// 2.  **Aligned Sequences In, Aligned Sequences Out**: regions and plate ids
//     are pairwise aligned inputs; the returned snippet paths are aligned
//     with them. A length mismatch is a hard validation error raised before
//     any file is written.
// 3.  **All or Nothing**: a frame that cannot be decoded fails the whole
//     call. There is no partial snippet list; downstream metrics cannot be
//     computed for a missing region set.
// 4.  **Geometry is a Precondition**: the extractor does not validate that a
//     region's bounding square lies inside the frame. Out-of-frame source
//     pixels are emitted as fully transparent, which keeps the output
//     well-formed without promising it is meaningful.

use image::{Rgba, RgbaImage};
use log::info;
use std::path::{Path, PathBuf};

use crate::config::RegionSpec;
use crate::error::{Result, VisionError};

/// Cuts one circular snippet per region out of the frame at `frame_path` and
/// writes each as an alpha-capable PNG under
/// `{output_root}/{chamber}/{plate}/{original filename}`.
///
/// Returns the written paths, order-aligned with `plates`.
pub fn cut_circle_snippets(
    frame_path: &Path,
    regions: &[RegionSpec],
    plates: &[String],
    chamber: &str,
    output_root: &Path,
) -> Result<Vec<PathBuf>> {
    if regions.len() != plates.len() {
        return Err(VisionError::LengthMismatch {
            what: "regions",
            got: regions.len(),
            expected: plates.len(),
        });
    }

    let frame = image::open(frame_path).map_err(|source| VisionError::FrameLoad {
        path: frame_path.to_path_buf(),
        source,
    })?;
    // `to_rgba8` synthesizes an opaque alpha channel when the source lacks
    // one, so the circular mask below can always signal through alpha.
    let frame = frame.to_rgba8();

    let filename = frame_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snippet.png".to_string());

    let mut saved_paths = Vec::with_capacity(plates.len());

    for (plate, region) in plates.iter().zip(regions.iter()) {
        let snippet = cut_one(&frame, region);

        let output_directory = output_root.join(chamber).join(plate);
        std::fs::create_dir_all(&output_directory)?;

        let output_path = output_directory.join(&filename);
        snippet.save(&output_path).map_err(|source| VisionError::Encode {
            path: output_path.clone(),
            source,
        })?;

        info!("saved circular snippet for plate {plate}: {}", output_path.display());
        saved_paths.push(output_path);
    }

    Ok(saved_paths)
}

/// Masks and crops a single circular region to its 2r x 2r bounding square.
fn cut_one(frame: &RgbaImage, region: &RegionSpec) -> RgbaImage {
    let r = region.radius as i64;
    let cx = region.center_x as i64;
    let cy = region.center_y as i64;
    let side = (2 * r) as u32;

    let mut snippet = RgbaImage::new(side, side);
    for sy in 0..side {
        for sx in 0..side {
            let dx = sx as i64 - r;
            let dy = sy as i64 - r;
            if dx * dx + dy * dy > r * r {
                // Outside the circle: stays fully transparent.
                continue;
            }

            let fx = cx + dx;
            let fy = cy + dy;
            let pixel = if fx >= 0
                && fy >= 0
                && (fx as u32) < frame.width()
                && (fy as u32) < frame.height()
            {
                *frame.get_pixel(fx as u32, fy as u32)
            } else {
                Rgba([0, 0, 0, 0])
            };
            snippet.put_pixel(sx, sy, pixel);
        }
    }
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChamberConfig;

    fn test_frame(name: &str, width: u32, height: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!("spore_vision_frame_{name}.png"));
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 180, 160]));
        img.save(&path).expect("write test frame");
        path
    }

    #[test]
    fn six_plate_chamber_produces_six_square_snippets() {
        let config = ChamberConfig::default();
        let frame_path = test_frame("chamber", 2100, 1450);
        let output_root = std::env::temp_dir().join("spore_vision_snippets_six");

        let paths = cut_circle_snippets(
            &frame_path,
            &config.regions,
            &config.plate_ids,
            &config.chamber,
            &output_root,
        )
        .expect("extract");

        assert_eq!(paths.len(), 6);
        for (path, plate) in paths.iter().zip(config.plate_ids.iter()) {
            let expected = output_root
                .join(&config.chamber)
                .join(plate)
                .join("spore_vision_frame_chamber.png");
            assert_eq!(path, &expected);

            let snippet = image::open(path).expect("reload").to_rgba8();
            assert_eq!(snippet.dimensions(), (500, 500));
        }
    }

    #[test]
    fn pixels_outside_the_circle_are_fully_transparent() {
        let frame_path = test_frame("mask", 200, 200);
        let regions = [RegionSpec::new(100, 100, 50)];
        let plates = ["SMP-TEST".to_string()];
        let output_root = std::env::temp_dir().join("spore_vision_snippets_mask");

        let paths =
            cut_circle_snippets(&frame_path, &regions, &plates, "CHA-TEST", &output_root)
                .expect("extract");
        let snippet = image::open(&paths[0]).expect("reload").to_rgba8();

        // Corners are well outside the inscribed circle.
        assert_eq!(snippet.get_pixel(0, 0)[3], 0);
        assert_eq!(snippet.get_pixel(99, 0)[3], 0);
        // The center is on the plate and fully opaque.
        assert_eq!(snippet.get_pixel(50, 50)[3], 255);

        // Exhaustive check of the circle invariant: strictly outside radius
        // means transparent.
        let r = 50i64;
        for (x, y, pixel) in snippet.enumerate_pixels() {
            let dx = x as i64 - r;
            let dy = y as i64 - r;
            if dx * dx + dy * dy > r * r {
                assert_eq!(pixel[3], 0, "pixel ({x},{y}) should be transparent");
            }
        }
    }

    #[test]
    fn mismatched_plate_list_is_rejected_before_any_write() {
        let frame_path = test_frame("mismatch", 100, 100);
        let regions = [RegionSpec::new(50, 50, 20), RegionSpec::new(60, 60, 20)];
        let plates = ["SMP-ONLY".to_string()];
        let output_root = std::env::temp_dir().join("spore_vision_snippets_mismatch");

        let err = cut_circle_snippets(&frame_path, &regions, &plates, "CHA-TEST", &output_root)
            .unwrap_err();
        assert!(matches!(err, VisionError::LengthMismatch { .. }));
    }

    #[test]
    fn missing_frame_fails_the_whole_call() {
        let regions = [RegionSpec::new(50, 50, 20)];
        let plates = ["SMP-A".to_string()];
        let err = cut_circle_snippets(
            Path::new("/definitely/not/here.png"),
            &regions,
            &plates,
            "CHA-TEST",
            &std::env::temp_dir(),
        )
        .unwrap_err();
        assert!(matches!(err, VisionError::FrameLoad { .. }));
    }
}
