//! Region detectors: anything that proposes labelled rectangles on a page.
//!
//! The arbiter only needs the `RegionDetector` trait. [`NullDetector`] stands
//! in when no model is configured; with the `onnx` feature a YOLO model can be
//! loaded lazily through [`LazyDetector`].

#[cfg(feature = "onnx")]
pub mod yolo;
#[cfg(feature = "onnx")]
pub use yolo::YoloRegionDetector;

use image::DynamicImage;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Axis-aligned box in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 { intersection / union } else { 0.0 }
    }
}

/// A labelled rectangle proposed by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub label: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Region {
    pub fn new(label: impl Into<String>, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            label: label.into(),
            bbox,
            confidence,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    /// The detector cannot be used at all (model missing, runtime failed to load).
    #[error("detector unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid detector input: {0}")]
    InvalidInput(String),
}

/// Proposes labelled regions on a page.
///
/// Implementations must be stateless across pages: the same page yields the
/// same regions.
pub trait RegionDetector {
    fn detect(&self, page: &DynamicImage) -> Result<Vec<Region>, DetectionError>;
}

impl<T: RegionDetector + ?Sized> RegionDetector for &T {
    fn detect(&self, page: &DynamicImage) -> Result<Vec<Region>, DetectionError> {
        (**self).detect(page)
    }
}

impl<T: RegionDetector + ?Sized> RegionDetector for Box<T> {
    fn detect(&self, page: &DynamicImage) -> Result<Vec<Region>, DetectionError> {
        (**self).detect(page)
    }
}

/// Detector that never finds anything; placement always uses the heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl RegionDetector for NullDetector {
    fn detect(&self, _page: &DynamicImage) -> Result<Vec<Region>, DetectionError> {
        Ok(Vec::new())
    }
}

/// Builds the wrapped detector on first use and reuses it for every page.
///
/// A failed build is remembered, so every later call reports the same
/// `Unavailable` error without retrying.
pub struct LazyDetector<D, F> {
    cell: OnceCell<Result<D, String>>,
    init: F,
}

impl<D, F> LazyDetector<D, F>
where
    F: Fn() -> Result<D, DetectionError>,
{
    pub fn new(init: F) -> Self {
        Self {
            cell: OnceCell::new(),
            init,
        }
    }

    fn get(&self) -> Result<&D, DetectionError> {
        let slot = self.cell.get_or_init(|| match (self.init)() {
            Ok(detector) => {
                info!("region detector initialized");
                Ok(detector)
            }
            Err(e) => {
                warn!(error = %e, "region detector failed to initialize");
                Err(e.to_string())
            }
        });
        slot.as_ref()
            .map_err(|reason| DetectionError::Unavailable(reason.clone()))
    }
}

impl<D, F> RegionDetector for LazyDetector<D, F>
where
    D: RegionDetector,
    F: Fn() -> Result<D, DetectionError>,
{
    fn detect(&self, page: &DynamicImage) -> Result<Vec<Region>, DetectionError> {
        self.get()?.detect(page)
    }
}

/// Greedy non-maximum suppression per label; keeps the most confident box of
/// each overlapping group. Output is ordered by descending confidence.
pub fn suppress_overlaps(mut regions: Vec<Region>, iou_threshold: f32) -> Vec<Region> {
    regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Region> = Vec::with_capacity(regions.len());
    for region in regions {
        let suppressed = keep
            .iter()
            .any(|k| k.label == region.label && k.bbox.iou(&region.bbox) >= iou_threshold);
        if !suppressed {
            keep.push(region);
        }
    }
    keep
}
