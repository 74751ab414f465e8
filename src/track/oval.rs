use std::f64::consts::TAU;

use super::{Point, TrackGeometry};

const PATH_POINTS: usize = 100;
const LANE_SPACING: f64 = 10.0;

/// Elliptical loop. Outer lanes run on a larger radius.
#[derive(Debug, Clone, PartialEq)]
pub struct Oval {
    width: f64,
    height: f64,
}

impl Oval {
    pub fn new(length: f64) -> Self {
        Oval {
            width: length / 3.0,
            height: length / 6.0,
        }
    }
}

impl TrackGeometry for Oval {
    fn generate_path(&self) -> Vec<Point> {
        (0..PATH_POINTS)
            .map(|i| {
                let angle = TAU * i as f64 / PATH_POINTS as f64;
                Point::new(self.width * angle.cos(), self.height * angle.sin())
            })
            .collect()
    }

    fn position_at(&self, relative: f64, lane: usize) -> Point {
        let angle = TAU * relative;
        let offset = lane as f64 * LANE_SPACING;
        Point::new(
            (self.width + offset) * angle.cos(),
            (self.height + offset) * angle.sin(),
        )
    }

    fn curve_factor(&self, relative: f64) -> f64 {
        // Sharpest at the ends of the major axis (sin = 0), straightest at
        // the sides.
        0.5 + 0.5 * (TAU * relative).sin().abs()
    }
}
