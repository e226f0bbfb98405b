//
// Reference velocity governor
//
// The reference velocity is nudged once per output sample by a step that
// shrinks as the vehicle gets faster, keeping acceleration and jerk
// comfortable without planning them explicitly.
//

use crate::config::{GovernorConfig, RampStep, SkipTimeProfile};

/// Miles per hour to meters per second
pub const MPH_TO_MPS: f64 = 0.44704;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Accelerate,
    Decelerate,
    Hold,
}

/// Velocity dependent step sizes
#[derive(Debug, Clone)]
pub struct AccelerationProfile {
    ramp: Vec<RampStep>,
}

impl AccelerationProfile {
    pub fn new(ramp: Vec<RampStep>) -> Self {
        AccelerationProfile { ramp }
    }

    /// Signed change of the reference velocity for one sample
    pub fn step(&self, current_velocity: f64, direction: Direction) -> f64 {
        let rung = self
            .ramp
            .iter()
            .find(|r| current_velocity < r.below)
            .or_else(|| self.ramp.last());
        match (rung, direction) {
            (Some(r), Direction::Accelerate) => r.accelerate,
            (Some(r), Direction::Decelerate) => -r.decelerate,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeedGovernor {
    profile: AccelerationProfile,
    max_reference_velocity: f64,
}

impl SpeedGovernor {
    pub fn new(config: &GovernorConfig) -> Self {
        SpeedGovernor {
            profile: AccelerationProfile::new(config.ramp.clone()),
            max_reference_velocity: config.max_reference_velocity,
        }
    }

    pub fn max_reference_velocity(&self) -> f64 {
        self.max_reference_velocity
    }

    /// Reference velocity matching a longitudinal goal velocity
    pub fn target_for(&self, goal_velocity: f64, cruise_goal_velocity: f64) -> f64 {
        if cruise_goal_velocity <= 0.0 {
            return 0.0;
        }
        (self.max_reference_velocity * goal_velocity / cruise_goal_velocity)
            .max(0.0)
            .min(self.max_reference_velocity)
    }

    /// One sample step from `current` towards `target`, never past it
    pub fn advance(&self, current: f64, target: f64) -> f64 {
        let target = target.max(0.0).min(self.max_reference_velocity);
        let next = if current < target {
            (current + self.profile.step(current, Direction::Accelerate)).min(target)
        } else if current > target {
            (current + self.profile.step(current, Direction::Decelerate)).max(target)
        } else {
            current
        };
        next.max(0.0).min(self.max_reference_velocity)
    }
}

/// Leading part of the winning trajectory that is not emitted
pub fn skip_time(
    profile: &SkipTimeProfile,
    reference_velocity: f64,
    lane_changing: bool,
    following: bool,
    horizon: f64,
    timestep: f64,
) -> f64 {
    let skip = if reference_velocity < profile.warmup_velocity {
        profile.warmup
    } else if lane_changing {
        profile.lane_change
    } else if following {
        profile.following
    } else {
        profile.cruise
    };
    skip.max(0.0).min((horizon - timestep).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn governor() -> SpeedGovernor {
        SpeedGovernor::new(&GovernorConfig::default())
    }

    #[test]
    fn test_profile_breakpoints() {
        let profile = AccelerationProfile::new(GovernorConfig::default().ramp);
        assert_abs_diff_eq!(profile.step(0.0, Direction::Accelerate), 0.224);
        assert_abs_diff_eq!(profile.step(15.0, Direction::Accelerate), 0.2);
        assert_abs_diff_eq!(profile.step(35.0, Direction::Decelerate), -0.3);
        assert_abs_diff_eq!(profile.step(48.0, Direction::Decelerate), -0.35);
        assert_eq!(profile.step(30.0, Direction::Hold), 0.0);
        assert_eq!(AccelerationProfile::new(Vec::new()).step(5.0, Direction::Accelerate), 0.0);
    }

    #[test]
    fn test_converges_monotonically_to_cap() {
        let g = governor();
        let target = g.target_for(7.0, 7.0);
        assert_abs_diff_eq!(target, 49.1, epsilon = 1e-9);

        let mut v = 0.0;
        for _ in 0..1000 {
            let next = g.advance(v, target);
            assert!(next >= v);
            assert!(next <= 49.1);
            v = next;
        }
        assert_abs_diff_eq!(v, 49.1, epsilon = 1e-9);
    }

    #[test]
    fn test_decelerates_without_undershoot() {
        let g = governor();
        let target = g.target_for(5.5, 7.0);
        assert_abs_diff_eq!(target, 49.1 * 5.5 / 7.0, epsilon = 1e-12);

        let mut v = 49.1;
        while v > target {
            let next = g.advance(v, target);
            assert!(next < v);
            v = next;
        }
        assert_abs_diff_eq!(v, target);
        assert_eq!(g.advance(v, target), v);
    }

    #[test]
    fn test_skip_time_cases() {
        let p = SkipTimeProfile::default();
        assert_eq!(skip_time(&p, 5.0, true, true, 6.0, 0.02), 0.0);
        assert_eq!(skip_time(&p, 30.0, true, true, 8.0, 0.02), 0.7);
        assert_eq!(skip_time(&p, 30.0, false, true, 6.0, 0.02), 3.6);
        assert_eq!(skip_time(&p, 30.0, false, false, 6.0, 0.02), 0.6);
        assert_abs_diff_eq!(skip_time(&p, 30.0, false, true, 2.0, 0.02), 1.98, epsilon = 1e-12);
    }
}
