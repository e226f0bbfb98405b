//! Waypoint based road map
//!
//! Frenet conversion over a polyline of centerline waypoints. `d` is positive
//! to the right of the driving direction. A closed map treats the last
//! waypoint as connected to the first and wraps `s` at the track length.

use std::f64::consts::PI;

use nalgebra::Vector2;

use crate::common::{PlannerError, PlannerResult, Point2D, RoadMap};

#[derive(Debug, Clone)]
pub struct WaypointMap {
    x: Vec<f64>,
    y: Vec<f64>,
    s: Vec<f64>,
    max_s: f64,
    closed: bool,
}

impl WaypointMap {
    /// Build a map from centerline waypoints, `s` is the cumulative chord length
    pub fn new(x: Vec<f64>, y: Vec<f64>, closed: bool) -> PlannerResult<Self> {
        if x.len() != y.len() {
            return Err(PlannerError::InvalidMap(format!(
                "{} x coordinates but {} y coordinates",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(PlannerError::InvalidMap(format!("{} waypoints, need at least 2", x.len())));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(PlannerError::InvalidMap("non-finite coordinate".to_string()));
        }

        let mut s = Vec::with_capacity(x.len());
        s.push(0.0);
        for i in 1..x.len() {
            let ds = (x[i] - x[i - 1]).hypot(y[i] - y[i - 1]);
            s.push(s[i - 1] + ds);
        }
        let n = x.len();
        let mut max_s = s[n - 1];
        if closed {
            max_s += (x[0] - x[n - 1]).hypot(y[0] - y[n - 1]);
        }
        if !(max_s > 0.0) {
            return Err(PlannerError::InvalidMap("zero length".to_string()));
        }
        Ok(WaypointMap { x, y, s, max_s, closed })
    }

    /// Straight road along +x
    pub fn straight(length: f64, spacing: f64) -> PlannerResult<Self> {
        if !(spacing > 0.0) || !(length > 0.0) {
            return Err(PlannerError::InvalidMap(format!("length {} spacing {}", length, spacing)));
        }
        let n = (length / spacing).ceil() as usize + 1;
        let x: Vec<f64> = (0..n).map(|i| i as f64 * spacing).collect();
        let y = vec![0.0; n];
        Self::new(x, y, false)
    }

    /// Counter-clockwise circular track around the origin, `d` grows outwards
    pub fn ring(radius: f64, n_waypoints: usize) -> PlannerResult<Self> {
        if !(radius > 0.0) || n_waypoints < 3 {
            return Err(PlannerError::InvalidMap(format!("radius {} with {} waypoints", radius, n_waypoints)));
        }
        let angle = |i: usize| 2.0 * PI * i as f64 / n_waypoints as f64;
        let x = (0..n_waypoints).map(|i| radius * angle(i).cos()).collect();
        let y = (0..n_waypoints).map(|i| radius * angle(i).sin()).collect();
        Self::new(x, y, true)
    }

    pub fn max_s(&self) -> f64 {
        self.max_s
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn waypoint(&self, i: usize) -> Option<Point2D> {
        Some(Point2D::new(*self.x.get(i)?, *self.y.get(i)?))
    }

    /// `s` folded into `[0, max_s)` on closed maps
    pub fn wrap_s(&self, s: f64) -> f64 {
        if self.closed {
            s.rem_euclid(self.max_s)
        } else {
            s
        }
    }

    /// Index of the waypoint nearest to `(x, y)`
    pub fn closest_waypoint(&self, x: f64, y: f64) -> usize {
        let mut d_min = f64::MAX;
        let mut ind_min = 0;
        for i in 0..self.x.len() {
            let d = (x - self.x[i]).hypot(y - self.y[i]);
            if d < d_min {
                d_min = d;
                ind_min = i;
            }
        }
        ind_min
    }

    /// Index of the first waypoint ahead of a pose heading `theta`
    pub fn next_waypoint(&self, x: f64, y: f64, theta: f64) -> usize {
        let mut closest = self.closest_waypoint(x, y);
        let heading = (self.y[closest] - y).atan2(self.x[closest] - x);
        let mut angle = (theta - heading).abs() % (2.0 * PI);
        angle = angle.min(2.0 * PI - angle);
        if angle > PI / 4.0 {
            closest += 1;
            if closest == self.x.len() {
                closest = if self.closed { 0 } else { closest - 1 };
            }
        }
        closest
    }

    /// Waypoint indices bounding the segment a pose lies on
    fn segment_around(&self, x: f64, y: f64, theta: f64) -> (usize, usize) {
        let n = self.x.len();
        let next = self.next_waypoint(x, y, theta);
        match (next, self.closed) {
            (0, true) => (n - 1, 0),
            (0, false) => (0, 1),
            (next, _) => (next - 1, next),
        }
    }

    /// Waypoint indices bounding the segment containing `s`
    fn segment_at(&self, s: f64) -> (usize, usize) {
        let n = self.x.len();
        let s = self.wrap_s(s);
        let after = self.s.partition_point(|&v| v <= s);
        if self.closed {
            let prev = after.saturating_sub(1);
            (prev, (prev + 1) % n)
        } else {
            let prev = after.saturating_sub(1).min(n - 2);
            (prev, prev + 1)
        }
    }

    fn point(&self, i: usize) -> Vector2<f64> {
        Vector2::new(self.x[i], self.y[i])
    }

    /// Cartesian pose to Frenet `(s, d)`
    pub fn get_frenet(&self, x: f64, y: f64, theta: f64) -> (f64, f64) {
        let (prev, next) = self.segment_around(x, y, theta);
        let n = self.point(next) - self.point(prev);
        let v = Vector2::new(x, y) - self.point(prev);

        let n_sq = n.norm_squared();
        let proj = if n_sq > 0.0 { n * (v.dot(&n) / n_sq) } else { Vector2::zeros() };
        let mut d = (v - proj).norm();
        // cross product sign tells which side of the segment the point is on
        if n.x * v.y - n.y * v.x > 0.0 {
            d = -d;
        }

        let along = if v.dot(&n) >= 0.0 { proj.norm() } else { -proj.norm() };
        (self.wrap_s(self.s[prev] + along), d)
    }

    /// Frenet `(s, d)` to Cartesian `(x, y)`
    pub fn get_xy(&self, s: f64, d: f64) -> (f64, f64) {
        let (prev, next) = self.segment_at(s);
        let heading = (self.y[next] - self.y[prev]).atan2(self.x[next] - self.x[prev]);
        let seg_s = self.wrap_s(s) - self.s[prev];
        let seg_x = self.x[prev] + seg_s * heading.cos();
        let seg_y = self.y[prev] + seg_s * heading.sin();

        let perp = heading - PI / 2.0;
        (seg_x + d * perp.cos(), seg_y + d * perp.sin())
    }
}

impl RoadMap for WaypointMap {
    fn to_frenet(&self, x: f64, y: f64, heading: f64) -> (f64, f64) {
        self.get_frenet(x, y, heading)
    }

    fn to_cartesian(&self, s: f64, d: f64) -> Point2D {
        let (x, y) = self.get_xy(s, d);
        Point2D::new(x, y)
    }
}
