use std::path::PathBuf;

use crate::placement::Placement;

/// Errors surfaced by the stamping engine.
///
/// Detector hiccups never show up here: the arbiter absorbs them and falls
/// back to the heuristic. Only an unusable detector (failed initialization)
/// is reported, as [`StampError::DetectorInit`].
#[derive(Debug, thiserror::Error)]
pub enum StampError {
    #[error("cannot read input {path}: {reason}")]
    Input { path: PathBuf, reason: String },

    #[error("page {page} could not be rasterized: {reason}")]
    Rasterization { page: usize, reason: String },

    #[error("no marker placement found on page {page}")]
    PlacementNotFound { page: usize },

    #[error("placement ({x}, {y}) with size {size} exceeds page {width}x{height}", x = .placement.x, y = .placement.y)]
    Composition {
        placement: Placement,
        size: u32,
        width: u32,
        height: u32,
    },

    #[error("unsupported pixel format for compositing: {0:?}")]
    PixelFormat(image::ColorType),

    #[error("marker encoding failed: {0}")]
    Marker(String),

    #[error("failed to write output {path}: {reason}")]
    OutputWrite { path: PathBuf, reason: String },

    #[error("region detector unavailable: {0}")]
    DetectorInit(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl StampError {
    pub fn input(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Input {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn output(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::OutputWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Page the failure is attributed to, if any (1-based).
    pub fn page(&self) -> Option<usize> {
        match self {
            Self::Rasterization { page, .. } | Self::PlacementNotFound { page } => Some(*page),
            _ => None,
        }
    }
}

/// Problems found while loading or validating a [`crate::StampConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, StampError>;
