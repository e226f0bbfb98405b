//! Common traits defining the seams between planner components

use crate::common::types::*;
use crate::trajectory::target_state::{Goal, TargetState};

/// Road geometry collaborator converting between Cartesian and Frenet frames
pub trait RoadMap {
    /// Frenet `(s, d)` of a Cartesian pose
    fn to_frenet(&self, x: f64, y: f64, heading: f64) -> (f64, f64);

    /// Cartesian position of a Frenet `(s, d)` pair
    fn to_cartesian(&self, s: f64, d: f64) -> Point2D;
}

/// Source of candidate end states for the trajectory search
pub trait GoalSampler {
    /// Draw a goal around the target's projection at time `t`
    fn sample(&mut self, target: &TargetState, t: f64) -> Goal;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat;

    impl RoadMap for Flat {
        fn to_frenet(&self, x: f64, y: f64, _heading: f64) -> (f64, f64) {
            (x, -y)
        }

        fn to_cartesian(&self, s: f64, d: f64) -> Point2D {
            Point2D::new(s, -d)
        }
    }

    #[test]
    fn test_road_map_trait() {
        let road = Flat;
        let p = road.to_cartesian(10.0, 2.0);
        let (s, d) = road.to_frenet(p.x, p.y, 0.0);
        assert!((s - 10.0).abs() < 1e-10);
        assert!((d - 2.0).abs() < 1e-10);
    }
}
