//! Cost functions over candidate trajectories
//!
//! Soft costs are squashed with [`logistic`] into `(-1, 1)`; hard costs
//! (collision, limits) are binary. The aggregate is a weighted sum whose
//! weights come from [`CostWeights`](crate::config::CostWeights).

use crate::config::{CostConfig, TrajectoryConfig};
use crate::prediction::vehicle_tracker::{TrackedVehicle, VehicleTracker};
use crate::trajectory::quintic_polynomials::Trajectory;
use crate::trajectory::target_state::TargetState;

/// Nearest approach reported when there is nothing to approach
pub const NO_VEHICLE_DISTANCE: f64 = 999_999.0;

/// Samples used for nearest-approach scans and integrals
const N_SAMPLES: usize = 100;

/// Maps `(-inf, inf)` onto `(-1, 1)` with `logistic(0) == 0`
pub fn logistic(x: f64) -> f64 {
    2.0 / (1.0 + (-x).exp()) - 1.0
}

/// `n` evenly spaced times in `[0, t)`
fn sample_times(t: f64, n: usize) -> impl Iterator<Item = f64> {
    (0..n).map(move |i| i as f64 / n as f64 * t)
}

type CostFn<'a> = fn(&CostEvaluator<'a>, &Trajectory) -> f64;

/// Scores trajectories against the tracked vehicles and the current target
pub struct CostEvaluator<'a> {
    config: &'a CostConfig,
    vehicles: &'a VehicleTracker,
    target: &'a TargetState,
    sigma_s: [f64; 3],
    sigma_d: [f64; 3],
}

impl<'a> CostEvaluator<'a> {
    /// Terminal state differences are scaled by the goal sampling sigmas of `trajectory`
    pub fn new(
        config: &'a CostConfig,
        trajectory: &TrajectoryConfig,
        vehicles: &'a VehicleTracker,
        target: &'a TargetState,
    ) -> Self {
        CostEvaluator {
            config,
            vehicles,
            target,
            sigma_s: trajectory.sigma_s,
            sigma_d: trajectory.sigma_d,
        }
    }

    pub fn target(&self) -> &'a TargetState {
        self.target
    }

    /// Weighted sum of every cost term with a non-zero weight
    pub fn calculate_cost(&self, traj: &Trajectory) -> f64 {
        let w = &self.config.weights;
        let terms: [(f64, CostFn<'a>); 11] = [
            (w.collision, Self::collision_cost),
            (w.total_acceleration, Self::total_acceleration_cost),
            (w.max_acceleration, Self::max_acceleration_cost),
            (w.efficiency, Self::efficiency_cost),
            (w.total_jerk, Self::total_jerk_cost),
            (w.buffer, Self::buffer_cost),
            (w.s_diff, Self::s_diff_cost),
            (w.d_diff, Self::d_diff_cost),
            (w.max_jerk, Self::max_jerk_cost),
            (w.speed_limit, Self::speed_limit_cost),
            (w.stay_in_lane, Self::stay_in_lane_cost),
        ];

        terms.iter()
            .filter(|(weight, _)| *weight != 0.0)
            .map(|(weight, cost)| weight * cost(self, traj))
            .sum()
    }

    /// Closest Euclidean `(s, d)` distance to one vehicle over the trajectory
    pub fn nearest_approach(&self, traj: &Trajectory, vehicle: &TrackedVehicle) -> f64 {
        sample_times(traj.t, N_SAMPLES)
            .map(|t| {
                let (s, d) = traj.position_at(t);
                let (vs, vd) = vehicle.position_in(t);
                (s - vs).hypot(d - vd)
            })
            .fold(NO_VEHICLE_DISTANCE, f64::min)
    }

    pub fn nearest_approach_to_any_vehicle(&self, traj: &Trajectory) -> f64 {
        self.vehicles
            .vehicles()
            .map(|v| self.nearest_approach(traj, v))
            .fold(NO_VEHICLE_DISTANCE, f64::min)
    }

    /// Nearest approach restricted to vehicles ahead in the trajectory's lane
    pub fn nearest_approach_to_vehicle_in_front(&self, traj: &Trajectory) -> f64 {
        let ego_s = traj.s.calc_point(0.0);
        let lane_d = traj.d.calc_point(traj.t);
        let window = self.config.front_lateral_window;
        self.vehicles
            .vehicles()
            .filter(|v| v.current.s > ego_s && (v.current.d - lane_d).abs() <= window)
            .map(|v| self.nearest_approach(traj, v))
            .fold(NO_VEHICLE_DISTANCE, f64::min)
    }

    /// 1 if any vehicle comes within the collision radius, else 0
    pub fn collision_cost(&self, traj: &Trajectory) -> f64 {
        let limit = self.config.collision_radius_factor * self.config.vehicle_radius;
        if self.nearest_approach_to_any_vehicle(traj) < limit {
            1.0
        } else {
            0.0
        }
    }

    /// Soft penalty growing as the nearest approach shrinks
    pub fn buffer_cost(&self, traj: &Trajectory) -> f64 {
        let nearest = self.nearest_approach_to_any_vehicle(traj);
        logistic(self.config.buffer_radius_factor * self.config.vehicle_radius / nearest)
    }

    /// 1 if a vehicle directly ahead is closer than the front buffer distance
    pub fn buffer_cost_front(&self, traj: &Trajectory) -> f64 {
        if self.nearest_approach_to_vehicle_in_front(traj) < self.config.front_buffer_distance {
            1.0
        } else {
            0.0
        }
    }

    pub fn total_acceleration_cost(&self, traj: &Trajectory) -> f64 {
        let dt = traj.t / N_SAMPLES as f64;
        let total: f64 = sample_times(traj.t, N_SAMPLES)
            .map(|t| (traj.s.calc_second_derivative(t) * dt).abs())
            .sum();
        logistic(total / traj.t / self.config.expected_acceleration_per_second)
    }

    pub fn max_acceleration_cost(&self, traj: &Trajectory) -> f64 {
        let max = sample_times(traj.t, self.config.acceleration_samples)
            .map(|t| traj.s.calc_second_derivative(t).abs())
            .fold(0.0, f64::max);
        if max > self.config.max_acceleration {
            1.0
        } else {
            0.0
        }
    }

    pub fn total_jerk_cost(&self, traj: &Trajectory) -> f64 {
        let dt = traj.t / N_SAMPLES as f64;
        let total: f64 = sample_times(traj.t, N_SAMPLES)
            .map(|t| (traj.s.calc_third_derivative(t) * dt).abs())
            .sum();
        logistic(total / traj.t / self.config.expected_jerk_per_second)
    }

    pub fn max_jerk_cost(&self, traj: &Trajectory) -> f64 {
        let max = sample_times(traj.t, self.config.acceleration_samples)
            .map(|t| traj.s.calc_third_derivative(t).abs())
            .fold(0.0, f64::max);
        if max > self.config.max_jerk {
            1.0
        } else {
            0.0
        }
    }

    /// Penalises an average velocity below the one the target implies
    pub fn efficiency_cost(&self, traj: &Trajectory) -> f64 {
        let avg_v = traj.s.calc_point(traj.t) / traj.t;
        let (s_targets, _) = self.target.targets_at(traj.t);
        let target_v = s_targets[0] / traj.t;
        if avg_v.abs() < f64::EPSILON {
            return if target_v > 0.0 { 1.0 } else { 0.0 };
        }
        logistic(2.0 * (target_v - avg_v) / avg_v)
    }

    /// Terminal longitudinal state against the projected target
    pub fn s_diff_cost(&self, traj: &Trajectory) -> f64 {
        let (s_targets, _) = self.target.targets_at(traj.t);
        terminal_diff(&traj.s.state_at(traj.t).to_array(), &s_targets, &self.sigma_s)
    }

    /// Terminal lateral state against the projected target
    pub fn d_diff_cost(&self, traj: &Trajectory) -> f64 {
        let (_, d_targets) = self.target.targets_at(traj.t);
        terminal_diff(&traj.d.state_at(traj.t).to_array(), &d_targets, &self.sigma_d)
    }

    pub fn speed_limit_cost(&self, traj: &Trajectory) -> f64 {
        let limit = self.config.speed_limit;
        if sample_times(traj.t, N_SAMPLES).any(|t| traj.s.calc_first_derivative(t) > limit) {
            1.0
        } else {
            0.0
        }
    }

    /// Accumulates a penalty for every sample drifting off the target lane
    pub fn stay_in_lane_cost(&self, traj: &Trajectory) -> f64 {
        let lane_d = self.target.d.position;
        sample_times(traj.t, N_SAMPLES)
            .map(|t| (traj.d.calc_point(t) - lane_d).abs())
            .filter(|deviation| *deviation > self.config.lane_deviation)
            .map(logistic)
            .sum()
    }
}

fn terminal_diff(actual: &[f64; 3], expected: &[f64; 3], sigma: &[f64; 3]) -> f64 {
    actual.iter()
        .zip(expected.iter())
        .zip(sigma.iter())
        .map(|((a, e), s)| logistic((a - e).abs() / s))
        .sum()
}
