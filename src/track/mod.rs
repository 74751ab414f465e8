//! Track geometry and conditions.
//!
//! A [`Track`] pairs a shape-specific [`Layout`] with the race length, lane
//! count and current [`TrackCondition`]. Every query takes a distance measured
//! along the track in race units; the track reduces it to a relative position
//! in `[0, 1)` before asking the layout, so shape parameters can change
//! without changing what an elapsed distance means.

pub mod condition;
pub mod figure_eight;
pub mod oval;
pub mod zigzag;

pub use condition::TrackCondition;
pub use figure_eight::FigureEight;
pub use oval::Oval;
pub use zigzag::Zigzag;

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

use crate::error::TrackError;

/// A 2D coordinate in layout space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self - other).norm()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalized(self) -> Point {
        let len = self.norm();
        if len > 0.0 {
            Point::new(self.x / len, self.y / len)
        } else {
            self
        }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Shape-specific geometry, evaluated at a relative position in `[0, 1)`.
pub trait TrackGeometry {
    /// Ordered points along the centre line.
    fn generate_path(&self) -> Vec<Point>;

    /// Position of a horse in `lane` (0-based) at relative position `relative`.
    fn position_at(&self, relative: f64, lane: usize) -> Point;

    /// Local sharpness in `[0, 1]`: 1.0 is straight, lower is a sharper turn.
    fn curve_factor(&self, relative: f64) -> f64;

    /// Whether `relative` lies on a self-intersection of the course.
    fn is_at_crossing(&self, _relative: f64) -> bool {
        false
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum TrackShape {
    Oval,
    FigureEight,
    Zigzag,
}

impl std::fmt::Display for TrackShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TrackShape::Oval => "Oval",
            TrackShape::FigureEight => "Figure-eight",
            TrackShape::Zigzag => "Zigzag",
        })
    }
}

/// Shape variant carrying its length-derived parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    Oval(Oval),
    FigureEight(FigureEight),
    Zigzag(Zigzag),
}

impl Layout {
    pub fn for_shape(shape: TrackShape, length: f64) -> Self {
        match shape {
            TrackShape::Oval => Layout::Oval(Oval::new(length)),
            TrackShape::FigureEight => Layout::FigureEight(FigureEight::new(length)),
            TrackShape::Zigzag => Layout::Zigzag(Zigzag::new(length)),
        }
    }

    pub fn shape(&self) -> TrackShape {
        match self {
            Layout::Oval(_) => TrackShape::Oval,
            Layout::FigureEight(_) => TrackShape::FigureEight,
            Layout::Zigzag(_) => TrackShape::Zigzag,
        }
    }

    fn geometry(&self) -> &dyn TrackGeometry {
        match self {
            Layout::Oval(g) => g,
            Layout::FigureEight(g) => g,
            Layout::Zigzag(g) => g,
        }
    }
}

/// A race course: name, shape, length, lanes and the current condition.
#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    length: u32,
    lanes: usize,
    condition: TrackCondition,
    layout: Layout,
    path: Vec<Point>,
}

impl Track {
    pub fn new(
        name: impl Into<String>,
        shape: TrackShape,
        length: u32,
        lanes: usize,
        condition: TrackCondition,
    ) -> Result<Self, TrackError> {
        if length == 0 {
            return Err(TrackError::ZeroLength);
        }
        if lanes == 0 {
            return Err(TrackError::ZeroLanes);
        }
        let layout = Layout::for_shape(shape, length as f64);
        let path = layout.geometry().generate_path();
        Ok(Track {
            name: name.into(),
            length,
            lanes,
            condition,
            layout,
            path,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> TrackShape {
        self.layout.shape()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn condition(&self) -> TrackCondition {
        self.condition
    }

    pub fn set_condition(&mut self, condition: TrackCondition) {
        self.condition = condition;
    }

    /// Change the race length; the layout and its path are regenerated.
    pub fn set_length(&mut self, length: u32) -> Result<(), TrackError> {
        if length == 0 {
            return Err(TrackError::ZeroLength);
        }
        self.length = length;
        self.layout = Layout::for_shape(self.shape(), length as f64);
        self.path = self.layout.geometry().generate_path();
        Ok(())
    }

    pub fn set_lanes(&mut self, lanes: usize) -> Result<(), TrackError> {
        if lanes == 0 {
            return Err(TrackError::ZeroLanes);
        }
        self.lanes = lanes;
        Ok(())
    }

    /// Centre-line points, regenerated whenever the length changes.
    pub fn path(&self) -> &[Point] {
        &self.path
    }

    /// Fraction of a lap covered by `distance`, in `[0, 1)`.
    pub fn relative_position(&self, distance: f64) -> f64 {
        let length = self.length as f64;
        distance.max(0.0).rem_euclid(length) / length
    }

    pub fn position_at(&self, distance: f64, lane: usize) -> Point {
        self.layout
            .geometry()
            .position_at(self.relative_position(distance), lane)
    }

    pub fn curve_factor(&self, distance: f64) -> f64 {
        self.layout
            .geometry()
            .curve_factor(self.relative_position(distance))
            .clamp(0.0, 1.0)
    }

    pub fn is_at_crossing(&self, distance: f64) -> bool {
        self.layout
            .geometry()
            .is_at_crossing(self.relative_position(distance))
    }

    pub fn is_complete(&self, distance: f64) -> bool {
        distance >= self.length as f64
    }
}
