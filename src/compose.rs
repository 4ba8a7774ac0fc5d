//! Pasting markers onto page rasters.

use image::imageops;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use crate::config::StampConfig;
use crate::error::{Result, StampError};
use crate::placement::Placement;

const PREVIEW_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const PREVIEW_STROKE: i32 = 2;

/// Paints an opaque backing patch and then the marker over the placement
/// rectangle. Pixels outside the rectangle are left untouched.
#[derive(Debug, Clone, Copy)]
pub struct Compositor {
    backing_level: u8,
}

impl Compositor {
    pub fn new(backing_level: u8) -> Self {
        Self { backing_level }
    }

    pub fn from_config(config: &StampConfig) -> Self {
        Self::new(config.backing_level)
    }

    /// Composites in place, keeping the page's pixel format.
    pub fn composite(
        &self,
        page: &mut DynamicImage,
        placement: Placement,
        marker: &GrayImage,
    ) -> Result<()> {
        let (width, height) = (page.width(), page.height());
        let (mw, mh) = marker.dimensions();
        let inside = placement
            .x
            .checked_add(mw)
            .zip(placement.y.checked_add(mh))
            .is_some_and(|(right, bottom)| right <= width && bottom <= height);
        if !inside {
            return Err(StampError::Composition {
                placement,
                size: mw.max(mh),
                width,
                height,
            });
        }

        let backing =
            DynamicImage::ImageLuma8(GrayImage::from_pixel(mw, mh, Luma([self.backing_level])));
        let marker = DynamicImage::ImageLuma8(marker.clone());
        let at = placement;
        match page {
            DynamicImage::ImageLuma8(buf) => paste(buf, &backing.to_luma8(), &marker.to_luma8(), at),
            DynamicImage::ImageLumaA8(buf) => {
                paste(buf, &backing.to_luma_alpha8(), &marker.to_luma_alpha8(), at)
            }
            DynamicImage::ImageRgb8(buf) => paste(buf, &backing.to_rgb8(), &marker.to_rgb8(), at),
            DynamicImage::ImageRgba8(buf) => paste(buf, &backing.to_rgba8(), &marker.to_rgba8(), at),
            DynamicImage::ImageLuma16(buf) => {
                paste(buf, &backing.to_luma16(), &marker.to_luma16(), at)
            }
            DynamicImage::ImageLumaA16(buf) => {
                paste(buf, &backing.to_luma_alpha16(), &marker.to_luma_alpha16(), at)
            }
            DynamicImage::ImageRgb16(buf) => paste(buf, &backing.to_rgb16(), &marker.to_rgb16(), at),
            DynamicImage::ImageRgba16(buf) => {
                paste(buf, &backing.to_rgba16(), &marker.to_rgba16(), at)
            }
            DynamicImage::ImageRgb32F(buf) => {
                paste(buf, &backing.to_rgb32f(), &marker.to_rgb32f(), at)
            }
            DynamicImage::ImageRgba32F(buf) => {
                paste(buf, &backing.to_rgba32f(), &marker.to_rgba32f(), at)
            }
            other => return Err(StampError::PixelFormat(other.color())),
        }

        debug!(x = placement.x, y = placement.y, size = mw, "marker composited");
        Ok(())
    }
}

fn paste<P: Pixel>(
    page: &mut ImageBuffer<P, Vec<P::Subpixel>>,
    backing: &ImageBuffer<P, Vec<P::Subpixel>>,
    marker: &ImageBuffer<P, Vec<P::Subpixel>>,
    at: Placement,
) {
    imageops::replace(page, backing, at.x as i64, at.y as i64);
    imageops::replace(page, marker, at.x as i64, at.y as i64);
}

/// Copy of `page` with a green frame around the marker slot.
pub fn visualize_placement(page: &DynamicImage, placement: Placement, size: u32) -> RgbaImage {
    let mut preview = page.to_rgba8();
    if size == 0 {
        return preview;
    }
    for inset in 0..PREVIEW_STROKE {
        let side = size as i32 - 2 * inset;
        if side <= 0 {
            break;
        }
        let rect = Rect::at(placement.x as i32 + inset, placement.y as i32 + inset)
            .of_size(side as u32, side as u32);
        draw_hollow_rect_mut(&mut preview, rect, PREVIEW_COLOR);
    }
    preview
}
