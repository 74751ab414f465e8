use super::{Point, TrackGeometry};

const SEGMENTS: usize = 6;
const LANE_SPACING: f64 = 8.0;

/// Straight legs joined by hairpin turns, alternating up and down.
#[derive(Debug, Clone, PartialEq)]
pub struct Zigzag {
    segment_width: f64,
    segment_height: f64,
}

impl Zigzag {
    pub fn new(length: f64) -> Self {
        Zigzag {
            segment_width: length / (2.0 * SEGMENTS as f64),
            segment_height: length / (4.0 * SEGMENTS as f64),
        }
    }

    /// Segment index and progress through it, both from a relative distance.
    fn locate(relative: f64) -> (usize, f64) {
        let scaled = relative * SEGMENTS as f64;
        let segment = (scaled.floor() as usize).min(SEGMENTS - 1);
        (segment, scaled - segment as f64)
    }

    fn rising(segment: usize) -> bool {
        segment % 2 == 0
    }
}

impl TrackGeometry for Zigzag {
    fn generate_path(&self) -> Vec<Point> {
        (0..=SEGMENTS)
            .map(|i| {
                let y = if Self::rising(i) { 0.0 } else { self.segment_height };
                Point::new(i as f64 * 2.0 * self.segment_width, y)
            })
            .collect()
    }

    fn position_at(&self, relative: f64, lane: usize) -> Point {
        let (segment, progress) = Self::locate(relative);
        let run = 2.0 * self.segment_width;
        let x = segment as f64 * run + run * progress;
        let (y, rise) = if Self::rising(segment) {
            (self.segment_height * progress, self.segment_height)
        } else {
            (self.segment_height * (1.0 - progress), -self.segment_height)
        };
        let direction = Point::new(run, rise).normalized();
        let normal = Point::new(-direction.y, direction.x);
        Point::new(x, y) + normal * (lane as f64 * LANE_SPACING)
    }

    fn curve_factor(&self, relative: f64) -> f64 {
        let scaled = relative * SEGMENTS as f64;
        let progress = scaled - scaled.floor();
        let from_turn = progress.min(1.0 - progress);
        0.2 + 0.8 * (from_turn * 5.0).min(1.0)
    }
}
