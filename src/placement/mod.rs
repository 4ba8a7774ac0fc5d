//! Where the marker goes: corner candidates, the detector/heuristic arbiter
//! and the value types they exchange.

pub mod arbiter;
pub use arbiter::{PlacementArbiter, PlacementDecision, Strategy};
pub mod selector;
pub use selector::{Candidate, CandidateSelector, Corner};

use serde::{Deserialize, Serialize};

/// Top-left corner of an accepted marker slot, in page pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

impl Placement {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// True if a `size x size` marker at this position lies inside the page.
    pub fn fits(&self, size: u32, width: u32, height: u32) -> bool {
        match (self.x.checked_add(size), self.y.checked_add(size)) {
            (Some(right), Some(bottom)) => right <= width && bottom <= height,
            _ => false,
        }
    }
}
