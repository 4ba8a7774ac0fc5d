//! Progressive probabilistic Hough transform for line segments.
//!
//! Edge points vote into a (theta, rho) accumulator one at a time. As soon as
//! a bin reaches the vote threshold the line through the current point is
//! walked in both directions, tolerating gaps up to `max_line_gap`, and the
//! pixels on it are removed from further voting. Points are visited in raster
//! order, so the output is fully deterministic for a given edge image.

use std::f64::consts::PI;

use image::GrayImage;

const ANGLE_STEPS: usize = 180;
const SHIFT: i64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSegment {
    pub start: (i32, i32),
    pub end: (i32, i32),
}

impl LineSegment {
    pub fn length(&self) -> f32 {
        let dx = (self.end.0 - self.start.0) as f32;
        let dy = (self.end.1 - self.start.1) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentOptions {
    pub vote_threshold: u32,
    pub min_line_length: u32,
    pub max_line_gap: u32,
}

struct Accumulator {
    votes: Vec<i32>,
    trig: Vec<(f64, f64)>,
    num_rho: usize,
    rho_offset: i64,
}

impl Accumulator {
    fn new(width: u32, height: u32) -> Self {
        let num_rho = ((width as usize + height as usize) * 2) + 1;
        let trig = (0..ANGLE_STEPS)
            .map(|n| {
                let theta = n as f64 * PI / ANGLE_STEPS as f64;
                (theta.cos(), theta.sin())
            })
            .collect();
        Self {
            votes: vec![0; ANGLE_STEPS * num_rho],
            trig,
            num_rho,
            rho_offset: (num_rho as i64 - 1) / 2,
        }
    }

    fn cell(&self, angle: usize, x: i64, y: i64) -> usize {
        let (cos, sin) = self.trig[angle];
        let rho = (x as f64 * cos + y as f64 * sin).round() as i64 + self.rho_offset;
        angle * self.num_rho + rho as usize
    }

    /// Adds the point's votes and returns the strongest angle at or above `threshold`.
    fn vote(&mut self, x: i64, y: i64, threshold: i32) -> Option<usize> {
        let mut best_votes = threshold - 1;
        let mut best_angle = None;
        for angle in 0..ANGLE_STEPS {
            let cell = self.cell(angle, x, y);
            self.votes[cell] += 1;
            if self.votes[cell] > best_votes {
                best_votes = self.votes[cell];
                best_angle = Some(angle);
            }
        }
        best_angle
    }

    fn unvote(&mut self, x: i64, y: i64) {
        for angle in 0..ANGLE_STEPS {
            let cell = self.cell(angle, x, y);
            self.votes[cell] -= 1;
        }
    }
}

/// Fixed-point walker along a line direction; one axis advances by whole pixels.
#[derive(Clone, Copy)]
struct Walk {
    x: i64,
    y: i64,
    dx: i64,
    dy: i64,
    major_x: bool,
}

impl Walk {
    fn new(x: i64, y: i64, cos: f64, sin: f64) -> Self {
        let a = -sin;
        let b = cos;
        let unit = (1i64 << SHIFT) as f64;
        if a.abs() > b.abs() {
            Self {
                x,
                y: (y << SHIFT) + (1 << (SHIFT - 1)),
                dx: if a > 0.0 { 1 } else { -1 },
                dy: (b * unit / a.abs()).round() as i64,
                major_x: true,
            }
        } else {
            Self {
                x: (x << SHIFT) + (1 << (SHIFT - 1)),
                y,
                dx: (a * unit / b.abs()).round() as i64,
                dy: if b > 0.0 { 1 } else { -1 },
                major_x: false,
            }
        }
    }

    fn reversed(self) -> Self {
        Self {
            dx: -self.dx,
            dy: -self.dy,
            ..self
        }
    }

    fn pixel(&self) -> (i64, i64) {
        if self.major_x {
            (self.x, self.y >> SHIFT)
        } else {
            (self.x >> SHIFT, self.y)
        }
    }

    fn advance(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
    }
}

pub fn detect_line_segments(edges: &GrayImage, options: &SegmentOptions) -> Vec<LineSegment> {
    let (width, height) = edges.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let (w, h) = (width as i64, height as i64);
    let index = |x: i64, y: i64| (y * w + x) as usize;
    let in_bounds = |x: i64, y: i64| x >= 0 && y >= 0 && x < w && y < h;

    let mut mask: Vec<bool> = edges.pixels().map(|p| p[0] != 0).collect();
    let points: Vec<(i64, i64)> = mask
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .map(|(i, _)| ((i as i64) % w, (i as i64) / w))
        .collect();

    let threshold = options.vote_threshold.max(1) as i32;
    let min_length = options.min_line_length as i64;
    let max_gap = options.max_line_gap as i64;
    let mut accumulator = Accumulator::new(width, height);
    let mut segments = Vec::new();

    for &(x, y) in &points {
        if !mask[index(x, y)] {
            continue;
        }
        let Some(angle) = accumulator.vote(x, y, threshold) else {
            continue;
        };

        let (cos, sin) = accumulator.trig[angle];
        let forward = Walk::new(x, y, cos, sin);
        let walks = [forward, forward.reversed()];

        let mut ends = [(x, y); 2];
        for (k, start) in walks.iter().enumerate() {
            let mut walk = *start;
            let mut gap = 0;
            loop {
                let (px, py) = walk.pixel();
                if !in_bounds(px, py) {
                    break;
                }
                if mask[index(px, py)] {
                    gap = 0;
                    ends[k] = (px, py);
                } else {
                    gap += 1;
                    if gap > max_gap {
                        break;
                    }
                }
                walk.advance();
            }
        }

        let good = (ends[1].0 - ends[0].0).abs() >= min_length
            || (ends[1].1 - ends[0].1).abs() >= min_length;

        for (k, start) in walks.iter().enumerate() {
            let mut walk = *start;
            loop {
                let (px, py) = walk.pixel();
                if !in_bounds(px, py) {
                    break;
                }
                let i = index(px, py);
                if mask[i] {
                    if good {
                        accumulator.unvote(px, py);
                    }
                    mask[i] = false;
                }
                if (px, py) == ends[k] {
                    break;
                }
                walk.advance();
            }
        }

        if good {
            segments.push(LineSegment {
                start: (ends[0].0 as i32, ends[0].1 as i32),
                end: (ends[1].0 as i32, ends[1].1 as i32),
            });
        }
    }

    segments
}
