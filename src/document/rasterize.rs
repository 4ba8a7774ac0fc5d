use std::path::Path;

use image::DynamicImage;
#[cfg(feature = "pdfium")]
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::{Result, StampError};

/// Turns an input file into page rasters, one page at a time.
pub trait Rasterizer {
    fn page_count(&self, path: &Path) -> Result<usize>;

    /// Renders page `page_index` (0-based) at `dpi`.
    fn rasterize(&self, path: &Path, dpi: u32, page_index: usize) -> Result<DynamicImage>;
}

/// A raster image file is a one-page document at its native resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRasterizer;

impl Rasterizer for ImageRasterizer {
    fn page_count(&self, path: &Path) -> Result<usize> {
        if !path.is_file() {
            return Err(StampError::input(path, "not a readable file"));
        }
        Ok(1)
    }

    fn rasterize(&self, path: &Path, _dpi: u32, page_index: usize) -> Result<DynamicImage> {
        if page_index != 0 {
            return Err(StampError::Rasterization {
                page: page_index + 1,
                reason: "raster images have a single page".into(),
            });
        }
        let page = image::open(path).map_err(|e| StampError::input(path, e))?;
        debug!(path = %path.display(), width = page.width(), height = page.height(), "image loaded");
        Ok(page)
    }
}

/// PDF rasterizer backed by the pdfium library.
#[cfg(feature = "pdfium")]
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

#[cfg(feature = "pdfium")]
impl PdfiumRasterizer {
    /// Binds pdfium from the working directory, then from the system.
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| StampError::input("pdfium", format!("cannot bind pdfium: {e}")))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    fn open<'a>(&'a self, path: &Path) -> Result<PdfDocument<'a>> {
        self.pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| StampError::input(path, e))
    }
}

#[cfg(feature = "pdfium")]
impl Rasterizer for PdfiumRasterizer {
    fn page_count(&self, path: &Path) -> Result<usize> {
        Ok(self.open(path)?.pages().len() as usize)
    }

    fn rasterize(&self, path: &Path, dpi: u32, page_index: usize) -> Result<DynamicImage> {
        let failed = |reason: String| StampError::Rasterization {
            page: page_index + 1,
            reason,
        };
        let document = self.open(path)?;
        let index = PdfPageIndex::try_from(page_index).map_err(|e| failed(e.to_string()))?;
        let page = document.pages().get(index).map_err(|e| failed(e.to_string()))?;

        let scale = dpi as f32 / 72.0;
        let width = (page.width().value * scale).round() as i32;
        let height = (page.height().value * scale).round() as i32;
        let bitmap = page
            .render_with_config(
                &PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height)
                    .render_form_data(true)
                    .render_annotations(true),
            )
            .map_err(|e| failed(e.to_string()))?;

        debug!(page = page_index + 1, width, height, dpi, "page rasterized");
        Ok(bitmap.as_image())
    }
}
