//! YOLOv5 empty-space detector on ONNX Runtime.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::detector::{BoundingBox, DetectionError, Region, RegionDetector, suppress_overlaps};

/// Box coordinates and objectness precede the class scores in each output row.
const ROW_PREFIX: usize = 5;

pub struct YoloRegionDetector {
    session: Mutex<Session>,
    config: DetectorConfig,
}

impl YoloRegionDetector {
    pub fn new(model_path: &Path, config: DetectorConfig) -> Result<Self, DetectionError> {
        info!(model = %model_path.display(), "loading YOLO model");
        let session = Session::builder()
            .map_err(|e| DetectionError::Unavailable(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| DetectionError::Unavailable(e.to_string()))?;
        Ok(Self {
            session: Mutex::new(session),
            config,
        })
    }

    /// Loads the model named by `config.model_path`.
    pub fn from_config(config: &DetectorConfig) -> Result<Self, DetectionError> {
        let path = config
            .model_path
            .as_deref()
            .ok_or_else(|| DetectionError::Unavailable("no model path configured".into()))?;
        Self::new(path, config.clone())
    }

    /// Stretches the page to the square network input, CHW, scaled to `[0, 1]`.
    fn preprocess(&self, page: &DynamicImage) -> Array4<f32> {
        let side = self.config.input_size;
        let resized = image::imageops::resize(&page.to_rgb8(), side, side, FilterType::Triangle);

        let side = side as usize;
        let mut input = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                input[[0, channel, y, x]] = f32::from(pixel[channel]) / 255.0;
            }
        }
        input
    }

    /// Decodes `(1, anchors, 5 + classes)` rows into page-space regions.
    fn decode(
        &self,
        dims: &[i64],
        data: &[f32],
        page_width: u32,
        page_height: u32,
    ) -> Result<Vec<Region>, DetectionError> {
        if dims.len() != 3 {
            return Err(DetectionError::Inference(format!(
                "expected 3D output tensor, got {}D",
                dims.len()
            )));
        }
        let anchors = dims[1] as usize;
        let row_len = dims[2] as usize;
        if row_len <= ROW_PREFIX || data.len() < anchors * row_len {
            return Err(DetectionError::Inference(format!(
                "unexpected output shape {dims:?}"
            )));
        }

        let input = self.config.input_size as f32;
        let sx = page_width as f32 / input;
        let sy = page_height as f32 / input;

        let mut regions = Vec::new();
        for row in data.chunks_exact(row_len).take(anchors) {
            let objectness = row[4];
            let Some((class_id, class_score)) = row[ROW_PREFIX..]
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
            else {
                continue;
            };
            let confidence = objectness * class_score;
            if confidence < self.config.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            let bbox = BoundingBox::new((cx - w / 2.0) * sx, (cy - h / 2.0) * sy, w * sx, h * sy);
            let label = self
                .config
                .class_names
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class_{class_id}"));
            regions.push(Region::new(label, bbox, confidence));
        }

        debug!(raw = regions.len(), "detections before suppression");
        Ok(suppress_overlaps(regions, self.config.iou_threshold))
    }
}

impl RegionDetector for YoloRegionDetector {
    fn detect(&self, page: &DynamicImage) -> Result<Vec<Region>, DetectionError> {
        if page.width() == 0 || page.height() == 0 {
            return Err(DetectionError::InvalidInput("empty page".into()));
        }
        let input = self.preprocess(page);
        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| DetectionError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectionError::Inference("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectionError::Inference(e.to_string()))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectionError::Inference(format!("failed to extract tensor: {e}")))?;

        let regions = self.decode(shape.as_ref(), data, page.width(), page.height())?;
        debug!(regions = regions.len(), "regions detected");
        Ok(regions)
    }
}
