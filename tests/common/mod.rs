#![allow(dead_code)]

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use page_stamp::document::{Assembler, Rasterizer};
use page_stamp::{Result, StampError};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const INK: Rgb<u8> = Rgb([0, 0, 0]);

pub fn blank_page(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, WHITE)
}

/// A small technical drawing: frame, title block in the bottom right corner
/// and a few rows of text-sized glyphs in the top left.
pub fn drawing(width: u32, height: u32) -> RgbImage {
    let mut img = blank_page(width, height);

    let border = 20;
    for inset in 0..3 {
        let rect = Rect::at(border + inset, border + inset)
            .of_size(width - 2 * (border + inset) as u32, height - 2 * (border + inset) as u32);
        draw_hollow_rect_mut(&mut img, rect, INK);
    }

    let (tb_w, tb_h) = (width / 3, height / 4);
    let tb = Rect::at((width - tb_w - 40) as i32, (height - tb_h - 40) as i32).of_size(tb_w, tb_h);
    draw_hollow_rect_mut(&mut img, tb, INK);
    draw_filled_rect_mut(
        &mut img,
        Rect::at(tb.left(), tb.top() + tb_h as i32 / 2).of_size(tb_w, 3),
        INK,
    );

    for row in 0..4 {
        for col in 0..8 {
            let glyph = Rect::at(80 + col * 22, 80 + row * 30).of_size(12, 16);
            draw_filled_rect_mut(&mut img, glyph, INK);
        }
    }
    img
}

/// White page with a filled dark block spanning `(x0, y0)` to `(x1, y1)`.
pub fn page_with_block(width: u32, height: u32, x0: i32, y0: i32, x1: u32, y1: u32) -> RgbImage {
    let mut img = blank_page(width, height);
    draw_filled_rect_mut(
        &mut img,
        Rect::at(x0, y0).of_size(x1 - x0 as u32, y1 - y0 as u32),
        INK,
    );
    img
}

/// Serves in-memory pages as a document.
pub struct StubRasterizer {
    pub pages: Vec<DynamicImage>,
}

impl StubRasterizer {
    pub fn new(pages: Vec<RgbImage>) -> Self {
        Self {
            pages: pages.into_iter().map(DynamicImage::ImageRgb8).collect(),
        }
    }
}

impl Rasterizer for StubRasterizer {
    fn page_count(&self, _path: &Path) -> Result<usize> {
        Ok(self.pages.len())
    }

    fn rasterize(&self, _path: &Path, _dpi: u32, page_index: usize) -> Result<DynamicImage> {
        self.pages
            .get(page_index)
            .cloned()
            .ok_or(StampError::Rasterization {
                page: page_index + 1,
                reason: "no such page".into(),
            })
    }
}

/// Keeps the pages it was given and writes a small marker file as output.
#[derive(Default)]
pub struct RecordingAssembler {
    pub pages: RefCell<Vec<RgbImage>>,
}

impl Assembler for RecordingAssembler {
    fn assemble(&self, pages: &[PathBuf], _dpi: u32, output: &Path) -> Result<()> {
        let mut seen = self.pages.borrow_mut();
        for page in pages {
            seen.push(image::open(page)?.to_rgb8());
        }
        std::fs::write(output, format!("{} pages", pages.len()))?;
        Ok(())
    }
}

pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
