// THEORY:
// The `config` module is the single explicit description of one physical
// chamber: where its plates sit inside the normalized frame, how the raw
// photo must be straightened, and how pixel areas map to physical areas.
//
// Key architectural principles:
// 1.  **No process-wide state**: every component call receives the values it
//     needs from a `ChamberConfig` owned by the caller. Nothing in the crate
//     reads globals.
// 2.  **Ordered, aligned sequences**: plates, regions, cultures and start
//     times are index-aligned vectors. Alignment is validated once, here, at
//     the boundary; single-item convenience inputs are broadcast here too,
//     so no downstream function ever re-implements "string or list"
//     normalization.
// 3.  **Serializable**: the whole config round-trips through serde, so a
//     deployment can keep it as a JSON file next to the capture hardware.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, VisionError};

/// One circular plate region inside the normalized chamber frame, in pixel
/// coordinates. The bounding square `[cx-r, cy-r) x [cx+r, cy+r)` is expected
/// to lie within the frame; this is a caller responsibility, not validated
/// beyond the mask math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub center_x: u32,
    pub center_y: u32,
    pub radius: u32,
}

impl RegionSpec {
    pub fn new(center_x: u32, center_y: u32, radius: u32) -> Self {
        Self {
            center_x,
            center_y,
            radius,
        }
    }
}

/// Axis-aligned crop rectangle applied after rotation correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The known reference pair converting pixel lengths to physical lengths.
/// A snippet is `diameter_px` pixels across and covers `diameter_mm`
/// millimetres of plate, so areas scale by `(diameter_mm / diameter_px)^2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReference {
    pub diameter_px: f64,
    pub diameter_mm: f64,
}

impl CalibrationReference {
    /// Physical length per pixel length. Strictly positive for any valid
    /// reference pair.
    pub fn factor(&self) -> f64 {
        self.diameter_mm / self.diameter_px
    }
}

/// The full description of one chamber: identity, geometry, calibration and
/// per-plate metadata. All per-plate vectors are index-aligned with
/// `plate_ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChamberConfig {
    /// Stable chamber identifier, used as the first path component for all
    /// snippet output.
    pub chamber: String,
    /// Ordered plate identifiers, one per physical slot.
    pub plate_ids: Vec<String>,
    /// Plate regions, index-aligned with `plate_ids`.
    pub regions: Vec<RegionSpec>,
    /// Clockwise mount misalignment of the camera, in degrees. The frame
    /// normalizer corrects it.
    pub rotation_angle_degrees: f32,
    /// Optional crop applied after rotation to trim the frame down to the
    /// chamber interior.
    pub crop: Option<CropRect>,
    /// Pixel-to-physical calibration reference.
    pub calibration: CalibrationReference,
    /// Human-readable substrate description.
    pub substrate: String,
    /// Culture labels, index-aligned with `plate_ids` (or a single shared
    /// label, broadcast by `validate_and_broadcast`).
    pub cultures: Vec<String>,
    /// ISO-8601 plate start timestamps, index-aligned with `plate_ids` (or a
    /// single shared value).
    pub plate_start_times: Vec<String>,
}

impl ChamberConfig {
    /// Loads a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ChamberConfig =
            serde_json::from_str(&text).map_err(|source| VisionError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config)
    }

    /// Validates sequence alignment and broadcasts single shared values.
    ///
    /// `regions` must match `plate_ids` exactly. `cultures` and
    /// `plate_start_times` may either match `plate_ids` or hold exactly one
    /// entry, which is then repeated for every plate. Any other length is a
    /// hard input-validation failure, reported before any processing starts.
    pub fn validate_and_broadcast(mut self) -> Result<Self> {
        let expected = self.plate_ids.len();

        if self.regions.len() != expected {
            return Err(VisionError::LengthMismatch {
                what: "regions",
                got: self.regions.len(),
                expected,
            });
        }

        broadcast(&mut self.cultures, expected, "cultures")?;
        broadcast(&mut self.plate_start_times, expected, "plate_start_times")?;

        Ok(self)
    }
}

/// Expands a single shared value to `expected` copies, or verifies an
/// already-aligned sequence.
fn broadcast(values: &mut Vec<String>, expected: usize, what: &'static str) -> Result<()> {
    if values.len() == expected {
        return Ok(());
    }
    if values.len() == 1 && expected > 1 {
        let shared = values[0].clone();
        values.resize(expected, shared);
        return Ok(());
    }
    Err(VisionError::LengthMismatch {
        what,
        got: values.len(),
        expected,
    })
}

impl Default for ChamberConfig {
    /// The six-plate reference chamber layout: a 2100x1450 normalized frame
    /// with two rows of three 500px plates.
    fn default() -> Self {
        Self {
            chamber: "CHA-8BEA5D1".to_string(),
            plate_ids: vec![
                "SMP-9414B8".to_string(),
                "SMP-837C0C".to_string(),
                "SMP-9A8231".to_string(),
                "SMP-7C43C2".to_string(),
                "SMP-85A40C".to_string(),
                "SMP-2EEFFF".to_string(),
            ],
            regions: vec![
                RegionSpec::new(505, 455, 250),
                RegionSpec::new(1065, 450, 250),
                RegionSpec::new(1625, 440, 250),
                RegionSpec::new(515, 1010, 250),
                RegionSpec::new(1075, 1000, 250),
                RegionSpec::new(1640, 1000, 250),
            ],
            rotation_angle_degrees: 1.0,
            crop: Some(CropRect {
                x: 630,
                y: 520,
                width: 2100,
                height: 1450,
            }),
            calibration: CalibrationReference {
                diameter_px: 500.0,
                diameter_mm: 58.0,
            },
            substrate: "Agar plate 100mm diameter".to_string(),
            cultures: vec![
                "Control".to_string(),
                "black morel, liquid culture".to_string(),
                "Entheogen Explosion".to_string(),
                "Golden Teacher Cubensis".to_string(),
                "Golden Teacher Cubensis".to_string(),
                "Golden Teacher Cubensis".to_string(),
            ],
            plate_start_times: vec![
                "2025-11-29T11:47:02Z".to_string(),
                "2025-12-01T11:20:15Z".to_string(),
                "2025-12-01T21:40:00Z".to_string(),
                "2025-12-02T18:51:00Z".to_string(),
                "2025-12-02T18:52:30Z".to_string(),
                "2025-12-02T18:53:45Z".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_aligned() {
        let config = ChamberConfig::default()
            .validate_and_broadcast()
            .expect("default config must validate");
        assert_eq!(config.plate_ids.len(), 6);
        assert_eq!(config.regions.len(), 6);
        assert_eq!(config.cultures.len(), 6);
        assert_eq!(config.plate_start_times.len(), 6);
    }

    #[test]
    fn single_culture_is_broadcast_to_all_plates() {
        let mut config = ChamberConfig::default();
        config.cultures = vec!["Oyster".to_string()];
        let config = config.validate_and_broadcast().expect("broadcast");
        assert_eq!(config.cultures.len(), 6);
        assert!(config.cultures.iter().all(|c| c == "Oyster"));
    }

    #[test]
    fn mismatched_regions_are_rejected() {
        let mut config = ChamberConfig::default();
        config.regions.pop();
        let err = config.validate_and_broadcast().unwrap_err();
        assert!(matches!(
            err,
            VisionError::LengthMismatch { what: "regions", got: 5, expected: 6 }
        ));
    }

    #[test]
    fn two_of_three_cultures_is_a_hard_failure() {
        let mut config = ChamberConfig::default();
        config.cultures = vec!["a".to_string(), "b".to_string()];
        assert!(config.validate_and_broadcast().is_err());
    }

    #[test]
    fn malformed_config_file_reports_a_parse_failure() {
        let path = std::env::temp_dir().join("spore_vision_config_malformed.json");
        std::fs::write(&path, "{ \"chamber\": ").expect("write");
        let err = ChamberConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, VisionError::ConfigParse { .. }));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ChamberConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: ChamberConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.chamber, config.chamber);
        assert_eq!(back.regions, config.regions);
    }
}
