// THEORY:
// The `contour` module is the data container of the segmentation layer. A
// `GrowthContour` is the traced, closed boundary of one connected region of
// detected growth inside a plate snippet, at one moment in time.
//
// Key architectural principles:
// 1.  **Dumb Data Container**: like the rest of the per-snapshot types in
//     this crate, a `GrowthContour` has no behavior beyond summarizing its
//     own geometry. It is produced by the contour detector, consumed by the
//     area calibrator and the storage records, and owned entirely by the
//     call that produced it.
// 2.  **Eager Aggregation**: pixel area, centroid and bounding box are
//     computed once at construction from the boundary points. The filter
//     stage of the detector reads these properties repeatedly, so they are
//     cached fields rather than methods that re-walk the polygon.
// 3.  **Polygon Semantics**: area and centroid use the standard closed
//     polygon (shoelace / Green's theorem) formulas over the integer
//     boundary points, which is what the plate metrics are calibrated
//     against. A degenerate boundary (zero signed area) has no centroid.

use image::GrayImage;
use serde::Serialize;

/// A single integer pixel coordinate on a snippet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box of a contour, inclusive on both corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

/// The traced closed boundary of one connected growth region.
#[derive(Debug, Clone, Serialize)]
pub struct GrowthContour {
    /// Ordered boundary points, as produced by boundary tracing. They
    /// describe a simple closed polygon.
    pub points: Vec<Point>,
    /// Enclosed area in pixels, from the shoelace formula. Always >= 0.
    pub pixel_area: f64,
    /// Area-weighted centroid of the enclosed polygon. `None` when the
    /// boundary encloses zero area (a line or a single pixel).
    pub centroid: Option<(f64, f64)>,
    /// Bounding box of the boundary points.
    pub bounding_box: BoundingBox,
}

impl GrowthContour {
    /// Builds a contour from traced boundary points, computing its summary
    /// geometry. Returns `None` for an empty point list.
    pub fn from_points(points: Vec<Point>) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in &points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        // Signed shoelace sum over the closed polygon; also accumulates the
        // centroid numerators from the same cross products.
        let n = points.len();
        let mut signed_2a = 0.0_f64;
        let mut cx_sum = 0.0_f64;
        let mut cy_sum = 0.0_f64;
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            let cross = (a.x as f64) * (b.y as f64) - (b.x as f64) * (a.y as f64);
            signed_2a += cross;
            cx_sum += (a.x as f64 + b.x as f64) * cross;
            cy_sum += (a.y as f64 + b.y as f64) * cross;
        }

        let pixel_area = signed_2a.abs() / 2.0;
        let centroid = if signed_2a == 0.0 {
            None
        } else {
            Some((cx_sum / (3.0 * signed_2a), cy_sum / (3.0 * signed_2a)))
        };

        Some(Self {
            points,
            pixel_area,
            centroid,
            bounding_box: BoundingBox {
                min_x,
                min_y,
                max_x,
                max_y,
            },
        })
    }

    /// Largest distance from any boundary point to the given center. Used by
    /// the detector's rim rejection, which must catch contours that bulge
    /// toward the snippet edge even when their centroid sits safely inside.
    pub fn max_distance_from(&self, center_x: f64, center_y: f64) -> f64 {
        self.points
            .iter()
            .map(|p| {
                let dx = p.x as f64 - center_x;
                let dy = p.y as f64 - center_y;
                (dx * dx + dy * dy).sqrt()
            })
            .fold(0.0, f64::max)
    }
}

/// Traces the external boundaries of all connected foreground (non-zero)
/// regions in a binary image. Inner hole boundaries are discarded; only the
/// outermost contour of each region is kept, in tracing discovery order.
pub fn trace_external_contours(mask: &GrayImage) -> Vec<GrowthContour> {
    imageproc::contours::find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.parent.is_none())
        .filter_map(|c| {
            let points = c
                .points
                .into_iter()
                .map(|p| Point::new(p.x, p.y))
                .collect();
            GrowthContour::from_points(points)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn square(x0: i32, y0: i32, side: i32) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ]
    }

    #[test]
    fn square_area_and_centroid() {
        let contour = GrowthContour::from_points(square(10, 10, 20)).expect("contour");
        assert_eq!(contour.pixel_area, 400.0);
        let (cx, cy) = contour.centroid.expect("centroid");
        assert!((cx - 20.0).abs() < 1e-9);
        assert!((cy - 20.0).abs() < 1e-9);
        assert_eq!(
            contour.bounding_box,
            BoundingBox {
                min_x: 10,
                min_y: 10,
                max_x: 30,
                max_y: 30
            }
        );
    }

    #[test]
    fn degenerate_line_has_no_centroid() {
        let contour =
            GrowthContour::from_points(vec![Point::new(0, 0), Point::new(10, 0)]).expect("contour");
        assert_eq!(contour.pixel_area, 0.0);
        assert!(contour.centroid.is_none());
    }

    #[test]
    fn winding_direction_does_not_change_area() {
        let mut reversed = square(0, 0, 8);
        reversed.reverse();
        let cw = GrowthContour::from_points(reversed).expect("contour");
        let ccw = GrowthContour::from_points(square(0, 0, 8)).expect("contour");
        assert_eq!(cw.pixel_area, ccw.pixel_area);
    }

    #[test]
    fn max_distance_tracks_the_farthest_boundary_point() {
        let contour = GrowthContour::from_points(square(0, 0, 10)).expect("contour");
        // Center of the square; the corners are the farthest points.
        let d = contour.max_distance_from(5.0, 5.0);
        assert!((d - (50.0_f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn empty_point_list_is_rejected() {
        assert!(GrowthContour::from_points(Vec::new()).is_none());
    }

    #[test]
    fn tracing_finds_one_external_contour_per_region() {
        let mut mask = GrayImage::new(60, 40);
        for y in 5..15 {
            for x in 5..15 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        for y in 20..30 {
            for x in 40..55 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }

        let contours = trace_external_contours(&mask);
        assert_eq!(contours.len(), 2);
        for contour in &contours {
            assert!(contour.pixel_area > 0.0);
        }
    }
}
