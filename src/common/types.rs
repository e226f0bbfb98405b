//! Common types used throughout highway_planner

use nalgebra::Vector2;

use crate::common::error::{PlannerError, PlannerResult};

/// Position, velocity and acceleration along one Frenet axis
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicState1D {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
}

impl KinematicState1D {
    pub fn new(position: f64, velocity: f64, acceleration: f64) -> Self {
        Self { position, velocity, acceleration }
    }

    pub fn at_rest(position: f64) -> Self {
        Self { position, velocity: 0.0, acceleration: 0.0 }
    }

    /// Constant-acceleration projection `t` seconds ahead.
    ///
    /// The acceleration is carried over unchanged.
    pub fn project(&self, t: f64) -> Self {
        Self {
            position: self.position + self.velocity * t + self.acceleration * t * t / 2.0,
            velocity: self.velocity + self.acceleration * t,
            acceleration: self.acceleration,
        }
    }

    /// Successor state from a new position sample taken `dt` seconds after `self`.
    ///
    /// `delta` is the already unwrapped position change, so callers can handle
    /// track seams before differencing.
    pub fn advanced_by(&self, delta: f64, dt: f64) -> PlannerResult<Self> {
        if dt <= 0.0 || !dt.is_finite() {
            return Err(PlannerError::InvalidTimestep(dt));
        }
        let velocity = delta / dt;
        Ok(Self {
            position: self.position + delta,
            velocity,
            acceleration: (velocity - self.velocity) / dt,
        })
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.position, self.velocity, self.acceleration]
    }
}

impl From<[f64; 3]> for KinematicState1D {
    fn from(a: [f64; 3]) -> Self {
        Self { position: a[0], velocity: a[1], acceleration: a[2] }
    }
}

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

/// Path represented as a sequence of 2D points
#[derive(Debug, Clone, PartialEq)]
pub struct Path2D {
    pub points: Vec<Point2D>,
}

impl Path2D {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn from_xy(x: &[f64], y: &[f64]) -> Self {
        let points = x.iter().zip(y.iter())
            .map(|(&x, &y)| Point2D::new(x, y))
            .collect();
        Self { points }
    }

    pub fn push(&mut self, point: Point2D) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&Point2D> {
        self.points.last()
    }

    /// First `n` points (or all of them if shorter)
    pub fn head(&self, n: usize) -> Path2D {
        Path2D::from_points(self.points.iter().take(n).copied().collect())
    }

    /// Heading of the final segment, if the path has at least two points
    pub fn end_heading(&self) -> Option<f64> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let (a, b) = (self.points[n - 2], self.points[n - 1]);
        Some((b.y - a.y).atan2(b.x - a.x))
    }

    pub fn x_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.x).collect()
    }

    pub fn y_coords(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.y).collect()
    }

    pub fn total_length(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        self.points.windows(2)
            .map(|w| w[0].distance(&w[1]))
            .sum()
    }
}

impl Default for Path2D {
    fn default() -> Self {
        Self::new()
    }
}
