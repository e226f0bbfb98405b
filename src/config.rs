//! Planner configuration
//!
//! Every tunable constant of the planner lives here. Each section implements
//! `Default` with the values the planner was tuned with, and the whole tree
//! can be overridden from a TOML file where absent keys keep their defaults.

use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::common::PlannerResult;

/// Top level planner configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub trajectory: TrajectoryConfig,
    pub cost: CostConfig,
    pub behavior: BehaviorConfig,
    pub governor: GovernorConfig,
    pub session: SessionConfig,
}

impl PlannerConfig {
    /// Load a configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> PlannerResult<Self> {
        let text = read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> PlannerResult<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Duration from a seconds value, zero for negative or non-finite input
pub fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Goal sampling and trajectory search parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Output sample spacing and goal-time window step [s]
    pub timestep: f64,
    /// Planning horizon while keeping a lane [s]
    pub horizon: f64,
    /// Planning horizon while a lane change is locked in [s]
    pub lane_change_horizon: f64,
    /// Perturbed goals drawn per goal time
    pub trajectory_samples: usize,
    /// Standard deviations of the longitudinal goal [pos, vel, acc]
    pub sigma_s: [f64; 3],
    /// Standard deviations of the lateral goal [pos, vel, acc]
    pub sigma_d: [f64; 3],
    /// Number of past winning trajectories kept
    pub history_len: usize,
    /// Score candidates on the rayon thread pool
    pub parallel_scoring: bool,
    /// Seed for goal sampling, entropy when unset
    pub seed: Option<u64>,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            timestep: 0.02,
            horizon: 6.0,
            lane_change_horizon: 8.0,
            trajectory_samples: 8,
            sigma_s: [4.0, 0.1, 0.01],
            sigma_d: [0.2, 0.1, 0.1],
            history_len: 10,
            parallel_scoring: false,
            seed: None,
        }
    }
}

/// Weights of the aggregate trajectory cost
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub collision: f64,
    pub total_acceleration: f64,
    pub max_acceleration: f64,
    pub efficiency: f64,
    pub total_jerk: f64,
    pub buffer: f64,
    pub s_diff: f64,
    pub d_diff: f64,
    pub max_jerk: f64,
    pub speed_limit: f64,
    pub stay_in_lane: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            collision: 0.5,
            total_acceleration: 1.0,
            max_acceleration: 1.0,
            efficiency: 0.2,
            total_jerk: 1.0,
            buffer: 0.5,
            s_diff: 0.2,
            d_diff: 0.2,
            max_jerk: 1.0,
            speed_limit: 0.0,
            stay_in_lane: 0.0,
        }
    }
}

/// Cost function thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Vehicles are modelled as circles of this radius [m]
    pub vehicle_radius: f64,
    /// Collision when nearest approach < factor * radius
    pub collision_radius_factor: f64,
    /// Buffer cost numerator factor
    pub buffer_radius_factor: f64,
    /// Distance below which a vehicle ahead triggers the front buffer [m]
    pub front_buffer_distance: f64,
    /// Lateral half window for "same lane" in the front buffer [m]
    pub front_lateral_window: f64,
    pub max_acceleration: f64,
    pub acceleration_samples: usize,
    pub expected_acceleration_per_second: f64,
    pub max_jerk: f64,
    pub expected_jerk_per_second: f64,
    pub speed_limit: f64,
    /// Lateral deviation tolerated by the stay-in-lane cost [m]
    pub lane_deviation: f64,
    pub weights: CostWeights,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            vehicle_radius: 1.5,
            collision_radius_factor: 30.0,
            buffer_radius_factor: 3.0,
            front_buffer_distance: 20.0,
            front_lateral_window: 2.0,
            max_acceleration: 8.0,
            acceleration_samples: 10,
            expected_acceleration_per_second: 1.0,
            max_jerk: 1.0,
            expected_jerk_per_second: 0.1,
            speed_limit: 48.0,
            lane_deviation: 1.0,
            weights: CostWeights::default(),
        }
    }
}

/// Lane selection parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub lane_width: f64,
    /// Lock held right after start-up [s]
    pub initial_hold: f64,
    /// Lock held after each committed lane change [s]
    pub cooldown: f64,
    /// Reference velocity band in which lanes are evaluated [mph]
    pub cruise_band: [f64; 2],
    /// Weight of the front buffer cost on the occupied lane
    pub current_lane_front_weight: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            lane_width: 4.0,
            initial_hold: 5.0,
            cooldown: 8.0,
            cruise_band: [28.0, 44.0],
            current_lane_front_weight: 0.55,
        }
    }
}

/// One rung of the comfort acceleration ladder
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RampStep {
    /// Applies while the reference velocity is below this value [mph]
    pub below: f64,
    /// Increment per output sample when speeding up [mph]
    pub accelerate: f64,
    /// Decrement per output sample when slowing down [mph]
    pub decelerate: f64,
}

/// Longitudinal speed governor parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub max_reference_velocity: f64,
    pub ramp: Vec<RampStep>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        let rung = |below, accelerate, decelerate| RampStep { below, accelerate, decelerate };
        Self {
            max_reference_velocity: 49.1,
            ramp: vec![
                rung(10.0, 0.224, 0.15),
                rung(20.0, 0.2, 0.2),
                rung(35.0, 0.16, 0.25),
                rung(45.0, 0.12, 0.3),
                rung(f64::INFINITY, 0.08, 0.35),
            ],
        }
    }
}

/// Warm-up offsets applied before sampling the winning trajectory
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SkipTimeProfile {
    /// Below this reference velocity nothing is skipped [mph]
    pub warmup_velocity: f64,
    pub warmup: f64,
    pub lane_change: f64,
    pub following: f64,
    pub cruise: f64,
}

impl Default for SkipTimeProfile {
    fn default() -> Self {
        Self {
            warmup_velocity: 10.0,
            warmup: 0.0,
            lane_change: 0.7,
            following: 3.6,
            cruise: 0.6,
        }
    }
}

/// Per-tick orchestration parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Goal velocity of the longitudinal target on a free road
    pub cruise_goal_velocity: f64,
    /// Goal velocity when a vehicle is close ahead
    pub slow_goal_velocity: f64,
    /// Lane change lock is released within this lateral distance of the center [m]
    pub lane_settle_tolerance: f64,
    /// Points of the previous output path carried into the next one
    pub previous_path_keeps: usize,
    /// Minimum time between two plans [s]
    pub replan_interval: f64,
    /// Budget for trajectory generation [ms]
    pub planning_budget_ms: u64,
    /// Track length after which `s` wraps [m]
    pub max_s: f64,
    /// Vehicles unseen for this many updates are forgotten
    pub stale_after_ticks: u64,
    pub skip_time: SkipTimeProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cruise_goal_velocity: 7.0,
            slow_goal_velocity: 5.5,
            lane_settle_tolerance: 0.3,
            previous_path_keeps: 10,
            replan_interval: 1.0,
            planning_budget_ms: 250,
            max_s: 6945.554,
            stale_after_ticks: 50,
            skip_time: SkipTimeProfile::default(),
        }
    }
}
