pub mod clahe;
pub use clahe::equalize_adaptive;
pub mod greyscale;
pub use greyscale::greyscale;
pub mod hough;
pub use hough::{LineSegment, SegmentOptions, detect_line_segments};
pub mod importance;
pub use importance::{ImportanceMap, build_importance_map};
pub mod strokes;
