//! Document I/O: page rasterization in, page reassembly out.

pub mod assemble;
pub use assemble::{Assembler, ImageAssembler, PdfAssembler};
pub mod rasterize;
#[cfg(feature = "pdfium")]
pub use rasterize::PdfiumRasterizer;
pub use rasterize::{ImageRasterizer, Rasterizer};

use std::path::Path;

/// Extensions treated as single-page raster input.
pub const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "tif", "tiff", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Pdf,
}

impl InputKind {
    /// Classifies a path by extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if ext == "pdf" {
            Some(Self::Pdf)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(InputKind::from_path(Path::new("a/plan.PDF")), Some(InputKind::Pdf));
        assert_eq!(InputKind::from_path(Path::new("scan.jpeg")), Some(InputKind::Image));
        assert_eq!(InputKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(InputKind::from_path(Path::new("noext")), None);
    }
}
