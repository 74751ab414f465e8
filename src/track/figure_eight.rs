use std::f64::consts::TAU;

use super::{Point, TrackGeometry};

const PATH_POINTS: usize = 200;
const LANE_SPACING: f64 = 8.0;
/// Both sine terms must be below this for a horse to count as on the crossing.
const CROSSING_TOLERANCE: f64 = 0.1;

/// Lemniscate-style loop: `x = w·sin(a)`, `y = h·sin(2a)`, self-intersecting
/// at the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureEight {
    width: f64,
    height: f64,
}

impl FigureEight {
    pub fn new(length: f64) -> Self {
        FigureEight {
            width: length / 5.0,
            height: length / 10.0,
        }
    }

    fn centre_line(&self, angle: f64) -> Point {
        Point::new(self.width * angle.sin(), self.height * (2.0 * angle).sin())
    }

    /// Unit normal to the centre line, from the normalised derivative.
    fn normal(&self, angle: f64) -> Point {
        let tangent = Point::new(
            self.width * angle.cos(),
            2.0 * self.height * (2.0 * angle).cos(),
        )
        .normalized();
        Point::new(-tangent.y, tangent.x)
    }
}

impl TrackGeometry for FigureEight {
    fn generate_path(&self) -> Vec<Point> {
        (0..PATH_POINTS)
            .map(|i| self.centre_line(TAU * i as f64 / PATH_POINTS as f64))
            .collect()
    }

    fn position_at(&self, relative: f64, lane: usize) -> Point {
        let angle = TAU * relative;
        let offset = lane as f64 * LANE_SPACING;
        self.centre_line(angle) + self.normal(angle) * offset
    }

    fn curve_factor(&self, relative: f64) -> f64 {
        let angle = TAU * relative;
        let crossing = angle.sin().abs();
        let general = 0.5 + 0.3 * (2.0 * angle).cos().abs();
        (0.3 * crossing + 0.7 * general).clamp(0.3, 1.0)
    }

    fn is_at_crossing(&self, relative: f64) -> bool {
        let angle = TAU * relative;
        angle.sin().abs() < CROSSING_TOLERANCE && (2.0 * angle).sin().abs() < CROSSING_TOLERANCE
    }
}
