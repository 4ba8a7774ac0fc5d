use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StampConfig;
use crate::detector::{DetectionError, Region, RegionDetector};
use crate::error::{Result, StampError};
use crate::imgproc::build_importance_map;
use crate::placement::Placement;
use crate::placement::selector::CandidateSelector;

/// Which strategy supplied a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Detector,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlacementDecision {
    pub placement: Placement,
    pub strategy: Strategy,
    /// Corner overlap, set for heuristic placements.
    pub overlap: Option<f64>,
    /// Detector confidence, set for detector placements.
    pub confidence: Option<f32>,
}

/// Region in whole page pixels after clipping to the page.
#[derive(Debug, Clone, Copy)]
struct PageRect {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl PageRect {
    /// Largest whole-pixel rectangle inside both the region and the page.
    fn clip(region: &Region, width: u32, height: u32) -> Option<Self> {
        let b = region.bbox;
        if !(b.x.is_finite() && b.y.is_finite() && b.width.is_finite() && b.height.is_finite()) {
            return None;
        }
        let (w, h) = (width as f64, height as f64);
        let x1 = (b.x as f64).max(0.0).ceil();
        let y1 = (b.y as f64).max(0.0).ceil();
        let x2 = (b.x as f64 + b.width as f64).min(w).floor();
        let y2 = (b.y as f64 + b.height as f64).min(h).floor();
        (x2 > x1 && y2 > y1).then(|| Self {
            x1: x1 as u32,
            y1: y1 as u32,
            x2: x2 as u32,
            y2: y2 as u32,
        })
    }

    fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Chooses one placement per page: the detector's largest empty region when
/// it can hold the marker, the corner heuristic otherwise.
pub struct PlacementArbiter<'a> {
    config: &'a StampConfig,
    detector: &'a dyn RegionDetector,
    selector: CandidateSelector,
}

impl<'a> PlacementArbiter<'a> {
    pub fn new(config: &'a StampConfig, detector: &'a dyn RegionDetector) -> Self {
        Self {
            config,
            detector,
            selector: CandidateSelector::from_config(config),
        }
    }

    /// `Ok(None)` when neither strategy finds room for the marker.
    pub fn place(&self, page: &DynamicImage) -> Result<Option<PlacementDecision>> {
        match self.detector.detect(page) {
            Ok(regions) => {
                if let Some(decision) = self.from_regions(&regions, page.width(), page.height()) {
                    info!(
                        x = decision.placement.x,
                        y = decision.placement.y,
                        "placement from detector"
                    );
                    return Ok(Some(decision));
                }
                debug!(regions = regions.len(), "no usable detector region");
            }
            Err(DetectionError::Unavailable(reason)) => {
                return Err(StampError::DetectorInit(reason));
            }
            Err(e) => warn!(error = %e, "detector failed, using heuristic"),
        }
        Ok(self.heuristic(page))
    }

    fn from_regions(&self, regions: &[Region], width: u32, height: u32) -> Option<PlacementDecision> {
        let detector = &self.config.detector;
        let size = self.config.marker_size;

        let mut best: Option<(PageRect, f32)> = None;
        for region in regions {
            if region.label != detector.empty_space_label
                || region.confidence < detector.confidence_threshold
            {
                continue;
            }
            let Some(rect) = PageRect::clip(region, width, height) else {
                continue;
            };
            if best.is_none_or(|(b, _)| rect.area() > b.area()) {
                best = Some((rect, region.confidence));
            }
        }

        let (rect, confidence) = best?;
        if rect.width() < size || rect.height() < size {
            debug!(
                width = rect.width(),
                height = rect.height(),
                "largest empty region too small"
            );
            return None;
        }
        let placement = Placement::new(rect.x1.min(rect.x2 - size), rect.y1.min(rect.y2 - size));
        placement.fits(size, width, height).then_some(PlacementDecision {
            placement,
            strategy: Strategy::Detector,
            overlap: None,
            confidence: Some(confidence),
        })
    }

    fn heuristic(&self, page: &DynamicImage) -> Option<PlacementDecision> {
        let map = build_importance_map(page, &self.config.importance);
        let candidate = self.selector.select(&map)?;
        info!(
            corner = ?candidate.corner,
            x = candidate.placement.x,
            y = candidate.placement.y,
            overlap = candidate.overlap,
            "placement from heuristic"
        );
        Some(PlacementDecision {
            placement: candidate.placement,
            strategy: Strategy::Heuristic,
            overlap: Some(candidate.overlap),
            confidence: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{BoundingBox, NullDetector};

    struct Fixed(Vec<Region>);

    impl RegionDetector for Fixed {
        fn detect(&self, _page: &DynamicImage) -> std::result::Result<Vec<Region>, DetectionError> {
            Ok(self.0.clone())
        }
    }

    struct Broken(fn() -> DetectionError);

    impl RegionDetector for Broken {
        fn detect(&self, _page: &DynamicImage) -> std::result::Result<Vec<Region>, DetectionError> {
            Err((self.0)())
        }
    }

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([255, 255, 255]),
        ))
    }

    fn empty(x: f32, y: f32, w: f32, h: f32) -> Region {
        Region::new("empty_space", BoundingBox::new(x, y, w, h), 0.8)
    }

    #[test]
    fn accepts_large_detector_region() {
        let config = StampConfig::default();
        let detector = Fixed(vec![empty(300.0, 200.0, 400.0, 300.0)]);
        let decision = PlacementArbiter::new(&config, &detector)
            .place(&white(1000, 800))
            .expect("place")
            .expect("decision");
        assert_eq!(decision.strategy, Strategy::Detector);
        assert_eq!(decision.placement, Placement::new(300, 200));
        assert_eq!(decision.confidence, Some(0.8));
    }

    #[test]
    fn clips_region_to_page() {
        let config = StampConfig::default();
        let detector = Fixed(vec![empty(800.5, -40.0, 300.0, 260.0)]);
        let decision = PlacementArbiter::new(&config, &detector)
            .place(&white(1000, 800))
            .expect("place")
            .expect("decision");
        assert_eq!(decision.strategy, Strategy::Detector);
        assert_eq!(decision.placement, Placement::new(801, 0));
    }

    #[test]
    fn picks_largest_region_and_ignores_other_labels() {
        let config = StampConfig::default();
        let detector = Fixed(vec![
            Region::new("title_block", BoundingBox::new(0.0, 0.0, 900.0, 700.0), 0.99),
            empty(10.0, 10.0, 160.0, 160.0),
            empty(500.0, 400.0, 300.0, 300.0),
        ]);
        let decision = PlacementArbiter::new(&config, &detector)
            .place(&white(1000, 800))
            .expect("place")
            .expect("decision");
        assert_eq!(decision.placement, Placement::new(500, 400));
    }

    #[test]
    fn small_region_falls_back() {
        let config = StampConfig::default();
        let detector = Fixed(vec![empty(100.0, 100.0, 80.0, 80.0)]);
        let decision = PlacementArbiter::new(&config, &detector)
            .place(&white(1000, 800))
            .expect("place")
            .expect("decision");
        assert_eq!(decision.strategy, Strategy::Heuristic);
        assert_eq!(decision.placement, Placement::new(800, 50));
    }

    #[test]
    fn low_confidence_region_is_ignored() {
        let config = StampConfig::default();
        let detector = Fixed(vec![Region::new(
            "empty_space",
            BoundingBox::new(300.0, 200.0, 400.0, 300.0),
            0.05,
        )]);
        let decision = PlacementArbiter::new(&config, &detector)
            .place(&white(1000, 800))
            .expect("place")
            .expect("decision");
        assert_eq!(decision.strategy, Strategy::Heuristic);
    }

    #[test]
    fn inference_error_falls_back() {
        let config = StampConfig::default();
        let detector = Broken(|| DetectionError::Inference("boom".into()));
        let decision = PlacementArbiter::new(&config, &detector)
            .place(&white(1000, 800))
            .expect("place")
            .expect("decision");
        assert_eq!(decision.strategy, Strategy::Heuristic);
    }

    #[test]
    fn unavailable_detector_is_fatal() {
        let config = StampConfig::default();
        let detector = Broken(|| DetectionError::Unavailable("no model".into()));
        let result = PlacementArbiter::new(&config, &detector).place(&white(1000, 800));
        assert!(matches!(result, Err(StampError::DetectorInit(_))));
    }

    #[test]
    fn no_room_anywhere() {
        let config = StampConfig::default();
        let result = PlacementArbiter::new(&config, &NullDetector)
            .place(&white(200, 800))
            .expect("place");
        assert!(result.is_none());
    }
}
