use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use oxidize_pdf::graphics::Image;
use oxidize_pdf::{Document, Page};
use tracing::{debug, info};

use crate::error::{Result, StampError};

const POINTS_PER_INCH: f64 = 72.0;

/// Combines stamped page rasters, in order, into one output file.
pub trait Assembler {
    fn assemble(&self, pages: &[PathBuf], dpi: u32, output: &Path) -> Result<()>;
}

/// Writes one JPEG-embedded PDF page per raster; page size follows the
/// raster resolution.
#[derive(Debug, Clone, Copy)]
pub struct PdfAssembler {
    jpeg_quality: u8,
}

impl PdfAssembler {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    fn encode_jpeg(&self, page: &DynamicImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality).encode_image(&page.to_rgb8())?;
        Ok(bytes)
    }
}

impl Assembler for PdfAssembler {
    fn assemble(&self, pages: &[PathBuf], dpi: u32, output: &Path) -> Result<()> {
        if pages.is_empty() {
            return Err(StampError::output(output, "no pages to assemble"));
        }
        let mut doc = Document::new();
        for (index, path) in pages.iter().enumerate() {
            let raster = image::open(path)?;
            let width = raster.width() as f64 * POINTS_PER_INCH / dpi as f64;
            let height = raster.height() as f64 * POINTS_PER_INCH / dpi as f64;
            let jpeg = self.encode_jpeg(&raster)?;
            drop(raster);

            let image = Image::from_jpeg_data(jpeg).map_err(|e| StampError::output(output, e))?;
            let name = format!("page{}", index + 1);
            let mut page = Page::new(width, height);
            page.add_image(name.as_str(), image);
            page.draw_image(&name, 0.0, 0.0, width, height)
                .map_err(|e| StampError::output(output, e))?;
            doc.add_page(page);
            debug!(page = index + 1, width, height, "page assembled");
        }
        doc.save(output).map_err(|e| StampError::output(output, e))?;
        info!(pages = pages.len(), output = %output.display(), "pdf assembled");
        Ok(())
    }
}

/// Re-encodes a single stamped raster in the format named by the output
/// extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAssembler;

impl Assembler for ImageAssembler {
    fn assemble(&self, pages: &[PathBuf], _dpi: u32, output: &Path) -> Result<()> {
        let [page] = pages else {
            return Err(StampError::output(
                output,
                format!("image output takes exactly one page, got {}", pages.len()),
            ));
        };
        let format = ImageFormat::from_path(output).map_err(|e| StampError::output(output, e))?;
        let raster = image::open(page)?;
        let raster = match format {
            ImageFormat::Jpeg => jpeg_compatible(raster),
            _ => raster,
        };
        raster
            .save_with_format(output, format)
            .map_err(|e| StampError::output(output, e))?;
        info!(output = %output.display(), "image written");
        Ok(())
    }
}

/// JPEG carries 8-bit gray or RGB only; other layouts are narrowed to the
/// nearest of the two.
fn jpeg_compatible(raster: DynamicImage) -> DynamicImage {
    match raster {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => raster,
        DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma8(raster.to_luma8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}
