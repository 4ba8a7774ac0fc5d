//! Engine configuration.
//!
//! One [`StampConfig`] is built by the caller (defaults or a JSON file) and
//! passed by reference to every component, so the marker size, margins and
//! resolution are the same everywhere in a run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const MARKER_SIZE: u32 = 150;
const EDGE_MARGIN: u32 = 50;
const RASTER_DPI: u32 = 300;
const BACKING_LEVEL: u8 = 255;
const JPEG_QUALITY: u8 = 92;

const CLAHE_CLIP_LIMIT: f32 = 2.0;
const CLAHE_TILE_GRID: u32 = 8;
const BLUR_SIGMA: f32 = 1.1;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const HOUGH_VOTE_THRESHOLD: u32 = 50;
const HOUGH_MIN_LINE_LENGTH: u32 = 100;
const HOUGH_MAX_LINE_GAP: u32 = 10;
const LINE_STROKE: u32 = 20;
const CONTOUR_MIN_AREA: f64 = 100.0;
const CONTOUR_MAX_AREA: f64 = 5000.0;
const CONTOUR_STROKE: u32 = 5;
const DILATE_RADIUS: u8 = 10;

const EMPTY_SPACE_LABEL: &str = "empty_space";
const DETECTOR_CONFIDENCE: f32 = 0.1;
const DETECTOR_IOU: f32 = 0.45;
const DETECTOR_INPUT_SIZE: u32 = 640;

/// Top-level configuration for placement, compositing and the page pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StampConfig {
    /// Side length of the square marker, in page pixels.
    pub marker_size: u32,
    /// Distance between corner candidates and the page edges.
    pub margin: u32,
    /// Resolution used to rasterize document pages.
    pub dpi: u32,
    /// Parent directory for per-document scratch space (system temp if unset).
    pub temp_root: Option<PathBuf>,
    /// Gray level of the opaque patch painted under the marker.
    pub backing_level: u8,
    /// JPEG quality for pages embedded in reassembled PDFs.
    pub jpeg_quality: u8,
    pub importance: ImportanceConfig,
    pub detector: DetectorConfig,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            marker_size: MARKER_SIZE,
            margin: EDGE_MARGIN,
            dpi: RASTER_DPI,
            temp_root: None,
            backing_level: BACKING_LEVEL,
            jpeg_quality: JPEG_QUALITY,
            importance: ImportanceConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl StampConfig {
    /// Reads a JSON config file; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.marker_size == 0 {
            return Err(invalid("marker_size", "must be greater than zero"));
        }
        if self.dpi == 0 {
            return Err(invalid("dpi", "must be greater than zero"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(invalid("jpeg_quality", "must be within 1..=100"));
        }
        self.importance.validate()?;
        self.detector.validate()
    }

    /// Smallest page edge on which every corner candidate fits.
    pub fn min_page_edge(&self) -> u32 {
        self.marker_size + 2 * self.margin
    }
}

/// Parameters of the edge/line/contour heuristic behind the importance map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceConfig {
    pub clahe_clip_limit: f32,
    pub clahe_tile_grid: u32,
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub hough_vote_threshold: u32,
    pub hough_min_line_length: u32,
    pub hough_max_line_gap: u32,
    pub line_stroke: u32,
    pub contour_min_area: f64,
    pub contour_max_area: f64,
    pub contour_stroke: u32,
    /// L-infinity radius of the final dilation (a radius of 10 is a 21px square).
    pub dilate_radius: u8,
}

impl Default for ImportanceConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: CLAHE_CLIP_LIMIT,
            clahe_tile_grid: CLAHE_TILE_GRID,
            blur_sigma: BLUR_SIGMA,
            canny_low: CANNY_LOW,
            canny_high: CANNY_HIGH,
            hough_vote_threshold: HOUGH_VOTE_THRESHOLD,
            hough_min_line_length: HOUGH_MIN_LINE_LENGTH,
            hough_max_line_gap: HOUGH_MAX_LINE_GAP,
            line_stroke: LINE_STROKE,
            contour_min_area: CONTOUR_MIN_AREA,
            contour_max_area: CONTOUR_MAX_AREA,
            contour_stroke: CONTOUR_STROKE,
            dilate_radius: DILATE_RADIUS,
        }
    }
}

impl ImportanceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.clahe_tile_grid == 0 {
            return Err(invalid("importance.clahe_tile_grid", "must be greater than zero"));
        }
        if self.canny_low > self.canny_high {
            return Err(invalid("importance.canny_low", "must not exceed canny_high"));
        }
        if self.contour_min_area > self.contour_max_area {
            return Err(invalid(
                "importance.contour_min_area",
                "must not exceed contour_max_area",
            ));
        }
        if self.hough_vote_threshold == 0 {
            return Err(invalid("importance.hough_vote_threshold", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Settings for the learned empty-space detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Label that marks usable empty space.
    pub empty_space_label: String,
    /// Detections below this confidence are dropped before arbitration.
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
    pub model_path: Option<PathBuf>,
    /// Class names in model output order.
    pub class_names: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            empty_space_label: EMPTY_SPACE_LABEL.to_string(),
            confidence_threshold: DETECTOR_CONFIDENCE,
            iou_threshold: DETECTOR_IOU,
            input_size: DETECTOR_INPUT_SIZE,
            model_path: None,
            class_names: vec![EMPTY_SPACE_LABEL.to_string()],
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(invalid("detector.confidence_threshold", "must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(invalid("detector.iou_threshold", "must be within 0..=1"));
        }
        if self.input_size == 0 {
            return Err(invalid("detector.input_size", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
