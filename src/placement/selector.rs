use serde::Serialize;
use tracing::debug;

use crate::config::StampConfig;
use crate::imgproc::ImportanceMap;
use crate::placement::Placement;

/// The four corner slots, in tie-breaking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Corner {
    TopRight,
    TopLeft,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ORDER: [Corner; 4] = [
        Corner::TopRight,
        Corner::TopLeft,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Top-left of this corner's slot; negative when the page is too small.
    fn origin(self, width: u32, height: u32, size: u32, margin: u32) -> (i64, i64) {
        let (w, h, s, m) = (width as i64, height as i64, size as i64, margin as i64);
        match self {
            Corner::TopRight => (w - s - m, m),
            Corner::TopLeft => (m, m),
            Corner::BottomLeft => (m, h - s - m),
            Corner::BottomRight => (w - s - m, h - s - m),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub corner: Corner,
    pub placement: Placement,
    /// Share of the slot covered by important content, in `[0, 1]`.
    pub overlap: f64,
}

/// Picks the corner slot that covers the least page content.
#[derive(Debug, Clone, Copy)]
pub struct CandidateSelector {
    marker_size: u32,
    margin: u32,
}

impl CandidateSelector {
    pub fn new(marker_size: u32, margin: u32) -> Self {
        Self {
            marker_size,
            margin,
        }
    }

    pub fn from_config(config: &StampConfig) -> Self {
        Self::new(config.marker_size, config.margin)
    }

    /// Corner slots that lie fully inside a `width x height` page, in order.
    pub fn positions(&self, width: u32, height: u32) -> Vec<(Corner, Placement)> {
        Corner::ORDER
            .iter()
            .filter_map(|&corner| {
                let (x, y) = corner.origin(width, height, self.marker_size, self.margin);
                let placement = Placement::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?);
                placement
                    .fits(self.marker_size, width, height)
                    .then_some((corner, placement))
            })
            .collect()
    }

    /// Scores every in-bounds corner against the map.
    pub fn candidates(&self, map: &ImportanceMap) -> Vec<Candidate> {
        self.positions(map.width(), map.height())
            .into_iter()
            .filter_map(|(corner, placement)| {
                let overlap = map.overlap(placement.x, placement.y, self.marker_size)?;
                Some(Candidate {
                    corner,
                    placement,
                    overlap,
                })
            })
            .collect()
    }

    /// Least-overlap candidate; earlier corners win exact ties.
    pub fn select(&self, map: &ImportanceMap) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for candidate in self.candidates(map) {
            debug!(
                corner = ?candidate.corner,
                x = candidate.placement.x,
                y = candidate.placement.y,
                overlap = candidate.overlap,
                "corner candidate"
            );
            if best.is_none_or(|b| candidate.overlap < b.overlap) {
                best = Some(candidate);
            }
        }
        best
    }
}
