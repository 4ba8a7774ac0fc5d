//! Stamps QR markers onto document pages without covering their content.
//!
//! Each page is rasterized, a marker slot is chosen (a detector's empty-space
//! region if one is large enough, otherwise the corner that overlaps the
//! least line work and text), the marker is composited and the pages are
//! reassembled. Multi-page documents are stamped all-or-nothing.

pub mod compose;
pub mod config;
pub mod detector;
pub mod document;
pub mod error;
pub mod imgproc;
pub mod marker;
pub mod pipeline;
pub mod placement;
pub mod record;

pub use compose::{Compositor, visualize_placement};
pub use config::StampConfig;
pub use detector::{NullDetector, Region, RegionDetector};
pub use error::{Result, StampError};
pub use marker::{MarkerPayload, MarkerRenderer};
pub use pipeline::{PagePipeline, PipelineResult, StampedArtifact};
pub use placement::{Placement, PlacementArbiter};
