//! Importance map: where a page carries content a marker must not cover.
//!
//! Ruling lines, frames and dimension lines are found with a probabilistic
//! Hough transform and painted wide; text and small symbols are found as
//! small-to-medium external contours of the edge image and painted thinner.
//! The result is dilated to keep a safety margin around everything found.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use tracing::debug;

use crate::config::ImportanceConfig;
use crate::imgproc::clahe::equalize_adaptive;
use crate::imgproc::greyscale::greyscale;
use crate::imgproc::hough::{SegmentOptions, detect_line_segments};
use crate::imgproc::strokes::{draw_thick_outline, draw_thick_segment, polygon_area};

const MARK: u8 = u8::MAX;

/// Single-channel mask with the page's dimensions; 255 marks significant content.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceMap {
    mask: GrayImage,
}

impl ImportanceMap {
    pub fn from_mask(mask: GrayImage) -> Self {
        Self { mask }
    }

    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    pub fn into_image(self) -> GrayImage {
        self.mask
    }

    pub fn is_blank(&self) -> bool {
        self.mask.pixels().all(|p| p[0] == 0)
    }

    /// Fraction of the `size x size` square at (`x`, `y`) covered by content,
    /// relative to a fully marked square. `None` if the square leaves the map.
    pub fn overlap(&self, x: u32, y: u32, size: u32) -> Option<f64> {
        if size == 0 {
            return None;
        }
        let right = x.checked_add(size)?;
        let bottom = y.checked_add(size)?;
        if right > self.width() || bottom > self.height() {
            return None;
        }

        let mut sum = 0u64;
        for py in y..bottom {
            for px in x..right {
                sum += self.mask.get_pixel(px, py)[0] as u64;
            }
        }
        let full = size as u64 * size as u64 * MARK as u64;
        Some(sum as f64 / full as f64)
    }
}

/// Builds the importance map of a page. Never fails; a featureless page
/// yields an all-zero map.
pub fn build_importance_map(page: &DynamicImage, config: &ImportanceConfig) -> ImportanceMap {
    let (width, height) = (page.width(), page.height());
    if width == 0 || height == 0 {
        return ImportanceMap::from_mask(GrayImage::new(width, height));
    }

    let gray = greyscale(page);
    let enhanced = equalize_adaptive(&gray, config.clahe_clip_limit, config.clahe_tile_grid);
    drop(gray);
    let smoothed = if config.blur_sigma > 0.0 {
        gaussian_blur_f32(&enhanced, config.blur_sigma)
    } else {
        enhanced
    };
    let edges = canny(&smoothed, config.canny_low, config.canny_high);
    drop(smoothed);

    let mut mask = GrayImage::new(width, height);

    let segments = detect_line_segments(
        &edges,
        &SegmentOptions {
            vote_threshold: config.hough_vote_threshold,
            min_line_length: config.hough_min_line_length,
            max_line_gap: config.hough_max_line_gap,
        },
    );
    for segment in &segments {
        draw_thick_segment(
            &mut mask,
            (segment.start.0 as f32, segment.start.1 as f32),
            (segment.end.0 as f32, segment.end.1 as f32),
            config.line_stroke,
            MARK,
        );
    }

    let mut kept_contours = 0usize;
    for contour in find_contours::<i32>(&edges) {
        if contour.border_type != BorderType::Outer || contour.parent.is_some() {
            continue;
        }
        let area = polygon_area(&contour.points);
        if area <= config.contour_min_area || area >= config.contour_max_area {
            continue;
        }
        draw_thick_outline(&mut mask, &contour.points, config.contour_stroke, MARK);
        kept_contours += 1;
    }

    let mask = if config.dilate_radius > 0 {
        dilate(&mask, Norm::LInf, config.dilate_radius)
    } else {
        mask
    };

    debug!(
        width,
        height,
        segments = segments.len(),
        contours = kept_contours,
        "importance map built"
    );
    ImportanceMap::from_mask(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn white_page(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
    }

    #[test]
    fn blank_page_has_blank_map() {
        let page = DynamicImage::ImageRgb8(white_page(400, 300));
        let map = build_importance_map(&page, &ImportanceConfig::default());
        assert_eq!((map.width(), map.height()), (400, 300));
        assert!(map.is_blank());
    }

    #[test]
    fn ruling_line_is_marked_with_margin() {
        let mut page = white_page(1000, 800);
        draw_filled_rect_mut(&mut page, Rect::at(300, 399).of_size(400, 3), Rgb([0, 0, 0]));
        let map = build_importance_map(&DynamicImage::ImageRgb8(page), &ImportanceConfig::default());

        assert_eq!(map.as_image().get_pixel(500, 400)[0], 255);
        assert_eq!(map.as_image().get_pixel(500, 412)[0], 255);
        assert_eq!(map.as_image().get_pixel(100, 700)[0], 0);
    }

    #[test]
    fn overlap_is_normalized() {
        let mut mask = GrayImage::new(20, 20);
        for y in 0..10 {
            for x in 0..20 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let map = ImportanceMap::from_mask(mask);
        assert_eq!(map.overlap(0, 0, 10), Some(1.0));
        assert_eq!(map.overlap(0, 10, 10), Some(0.0));
        assert_eq!(map.overlap(0, 5, 10), Some(0.5));
        assert_eq!(map.overlap(11, 0, 10), None);
    }

    #[test]
    fn same_page_same_map() {
        let mut page = white_page(600, 500);
        draw_filled_rect_mut(&mut page, Rect::at(100, 100).of_size(250, 4), Rgb([20, 20, 20]));
        draw_filled_rect_mut(&mut page, Rect::at(400, 300).of_size(30, 30), Rgb([0, 0, 0]));
        let page = DynamicImage::ImageRgb8(page);
        let config = ImportanceConfig::default();
        assert_eq!(build_importance_map(&page, &config), build_importance_map(&page, &config));
    }
}
