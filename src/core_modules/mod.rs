pub mod area_calibrator;
pub mod color_metrics;
pub mod contour;
pub mod contour_detector;
pub mod frame_normalizer;
pub mod region_extractor;
pub mod timelapse;
pub mod timestamp;
