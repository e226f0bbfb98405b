//! Jerk-minimal quintic polynomials
//!
//! A quintic `x(t) = a0 + a1 t + a2 t^2 + a3 t^3 + a4 t^4 + a5 t^5` is the
//! unique jerk-minimising motion connecting two `[pos, vel, acc]` boundary
//! states over a fixed duration.

use nalgebra::{Matrix3, Vector3};

use crate::common::{KinematicState1D, PlannerError, PlannerResult};

/// Durations below this are treated as zero
const MIN_DURATION: f64 = 1e-9;

/// Number of coefficients in a quintic
pub const N_COEFFICIENTS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuinticPolynomial {
    pub coefficients: [f64; N_COEFFICIENTS],
}

impl QuinticPolynomial {
    pub fn new(coefficients: [f64; N_COEFFICIENTS]) -> Self {
        QuinticPolynomial { coefficients }
    }

    /// Constant polynomial `x(t) = value`
    pub fn constant(value: f64) -> Self {
        QuinticPolynomial { coefficients: [value, 0.0, 0.0, 0.0, 0.0, 0.0] }
    }

    pub fn calc_point(&self, t: f64) -> f64 {
        let a = &self.coefficients;
        a[0] + a[1] * t + a[2] * t.powi(2) + a[3] * t.powi(3) + a[4] * t.powi(4) + a[5] * t.powi(5)
    }

    pub fn calc_first_derivative(&self, t: f64) -> f64 {
        let a = &self.coefficients;
        a[1] + 2.0 * a[2] * t + 3.0 * a[3] * t.powi(2) + 4.0 * a[4] * t.powi(3) + 5.0 * a[5] * t.powi(4)
    }

    pub fn calc_second_derivative(&self, t: f64) -> f64 {
        let a = &self.coefficients;
        2.0 * a[2] + 6.0 * a[3] * t + 12.0 * a[4] * t.powi(2) + 20.0 * a[5] * t.powi(3)
    }

    pub fn calc_third_derivative(&self, t: f64) -> f64 {
        let a = &self.coefficients;
        6.0 * a[3] + 24.0 * a[4] * t + 60.0 * a[5] * t.powi(2)
    }

    /// `[pos, vel, acc]` at time `t`
    pub fn state_at(&self, t: f64) -> KinematicState1D {
        KinematicState1D::new(
            self.calc_point(t),
            self.calc_first_derivative(t),
            self.calc_second_derivative(t),
        )
    }

    /// Same curve moved by a constant offset
    pub fn shifted(&self, offset: f64) -> Self {
        let mut coefficients = self.coefficients;
        coefficients[0] += offset;
        QuinticPolynomial { coefficients }
    }
}

/// Jerk-minimal trajectory from `start` to `goal` in `time` seconds.
///
/// `c0..c2` follow directly from the start state; `c3..c5` solve the 3x3
/// system matching position, velocity and acceleration at `t = time`.
pub fn solve(
    start: &KinematicState1D,
    goal: &KinematicState1D,
    time: f64,
) -> PlannerResult<QuinticPolynomial> {
    if !time.is_finite() || time < MIN_DURATION {
        return Err(PlannerError::InvalidDuration(time));
    }

    let a0 = start.position;
    let a1 = start.velocity;
    let a2 = start.acceleration / 2.0;

    let t2 = time * time;
    let t3 = t2 * time;
    let t4 = t3 * time;
    let t5 = t4 * time;

    let a = Matrix3::new(
        t3, t4, t5,
        3.0 * t2, 4.0 * t3, 5.0 * t4,
        6.0 * time, 12.0 * t2, 20.0 * t3,
    );

    let b = Vector3::new(
        goal.position - (a0 + a1 * time + a2 * t2),
        goal.velocity - (a1 + 2.0 * a2 * time),
        goal.acceleration - 2.0 * a2,
    );

    let x = a.try_inverse().map(|inv| inv * b).ok_or(PlannerError::SingularSystem)?;
    if x.iter().any(|c| !c.is_finite()) {
        return Err(PlannerError::SingularSystem);
    }

    Ok(QuinticPolynomial::new([a0, a1, a2, x[0], x[1], x[2]]))
}

/// Longitudinal and lateral quintics sharing one duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    pub s: QuinticPolynomial,
    pub d: QuinticPolynomial,
    pub t: f64,
}

impl Trajectory {
    pub fn new(s: QuinticPolynomial, d: QuinticPolynomial, t: f64) -> Self {
        Trajectory { s, d, t }
    }

    /// Solve both axes towards a goal reached after `t` seconds
    pub fn between(
        start_s: &KinematicState1D,
        start_d: &KinematicState1D,
        goal_s: &KinematicState1D,
        goal_d: &KinematicState1D,
        t: f64,
    ) -> PlannerResult<Self> {
        Ok(Trajectory {
            s: solve(start_s, goal_s, t)?,
            d: solve(start_d, goal_d, t)?,
            t,
        })
    }

    /// Frenet position at time `t`
    pub fn position_at(&self, t: f64) -> (f64, f64) {
        (self.s.calc_point(t), self.d.calc_point(t))
    }

    /// Copy whose lateral curve ends on `d_end` instead.
    pub fn with_lateral_goal(&self, d_end: f64) -> Self {
        let offset = d_end - self.d.calc_point(self.t);
        Trajectory { s: self.s, d: self.d.shifted(offset), t: self.t }
    }

    /// Flat `[s0..s5, d0..d5, T]` layout
    pub fn to_array(&self) -> [f64; 13] {
        let mut out = [0.0; 13];
        out[..6].copy_from_slice(&self.s.coefficients);
        out[6..12].copy_from_slice(&self.d.coefficients);
        out[12] = self.t;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn check_boundaries(start: [f64; 3], goal: [f64; 3], time: f64) {
        let p = solve(&start.into(), &goal.into(), time).unwrap();
        let at_start = p.state_at(0.0);
        let at_end = p.state_at(time);
        assert_abs_diff_eq!(at_start.position, start[0], epsilon = 1e-9);
        assert_abs_diff_eq!(at_start.velocity, start[1], epsilon = 1e-9);
        assert_abs_diff_eq!(at_start.acceleration, start[2], epsilon = 1e-9);
        assert_abs_diff_eq!(at_end.position, goal[0], epsilon = 1e-6);
        assert_abs_diff_eq!(at_end.velocity, goal[1], epsilon = 1e-6);
        assert_abs_diff_eq!(at_end.acceleration, goal[2], epsilon = 1e-6);
    }

    #[test]
    fn test_straight_solve() {
        let p = solve(&[0.0, 10.0, 0.0].into(), &[10.0, 10.0, 0.0].into(), 1.0).unwrap();
        let expected = [0.0, 10.0, 0.0, 0.0, 0.0, 0.0];
        for (c, e) in p.coefficients.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*c, *e, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_boundary_conditions() {
        check_boundaries([0.0, 10.0, 0.0], [10.0, 20.0, 0.0], 1.0);
        check_boundaries([4.0, 2.0, 1.6], [130.0, 28.0, -0.5], 5.0);
        check_boundaries([5.0, 10.0, 2.0], [-30.0, -20.0, -4.0], 2.0);
        check_boundaries([6.0, 0.0, 0.0], [2.0, 0.0, 0.0], 8.0);
    }

    #[test]
    fn test_invalid_duration() {
        let start = KinematicState1D::at_rest(0.0);
        let goal = KinematicState1D::at_rest(1.0);
        assert!(matches!(solve(&start, &goal, 0.0), Err(PlannerError::InvalidDuration(_))));
        assert!(matches!(solve(&start, &goal, -1.0), Err(PlannerError::InvalidDuration(_))));
        assert!(matches!(solve(&start, &goal, f64::NAN), Err(PlannerError::InvalidDuration(_))));
    }

    #[test]
    fn test_lateral_goal_substitution() {
        let traj = Trajectory::between(
            &[0.0, 20.0, 0.0].into(),
            &[6.0, 0.0, 0.0].into(),
            &[120.0, 20.0, 0.0].into(),
            &[6.0, 0.0, 0.0].into(),
            6.0,
        ).unwrap();
        let moved = traj.with_lateral_goal(2.0);
        assert_abs_diff_eq!(moved.d.calc_point(6.0), 2.0, epsilon = 1e-9);
        assert_eq!(moved.s, traj.s);
        assert_eq!(moved.to_array()[12], 6.0);
    }
}
