use std::path::{Path, PathBuf};

use image::DynamicImage;
use tempfile::TempDir;
use tracing::debug;

use crate::error::Result;

const PREFIX: &str = "stamp_";

/// Per-document scratch directory; removed with everything in it on drop.
pub struct ScratchSpace {
    dir: TempDir,
    pages: Vec<PathBuf>,
}

impl ScratchSpace {
    /// Creates the directory under `root`, or the system temp dir.
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        debug!(path = %dir.path().display(), "scratch space created");
        Ok(Self {
            dir,
            pages: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a stamped page (1-based number) as PNG and releases the raster.
    pub fn accumulate(&mut self, page: usize, raster: DynamicImage) -> Result<()> {
        let path = self.dir.path().join(format!("page_{page}.png"));
        // PNG has no float samples
        let raster = match raster {
            DynamicImage::ImageRgb32F(_) => DynamicImage::ImageRgb16(raster.to_rgb16()),
            DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgba16(raster.to_rgba16()),
            other => other,
        };
        raster.save_with_format(&path, image::ImageFormat::Png)?;
        drop(raster);
        debug!(page, path = %path.display(), "page accumulated");
        self.pages.push(path);
        Ok(())
    }

    /// Accumulated pages in the order they were added.
    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    /// Where the assembler writes before the result is published.
    pub fn staging_path(&self, output: &Path) -> PathBuf {
        let name = match output.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("assembled.{ext}"),
            None => "assembled".to_string(),
        };
        self.dir.path().join(name)
    }

    /// Removes the directory now, reporting failures.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!(path = %path.display(), "scratch space removed");
        Ok(())
    }
}
