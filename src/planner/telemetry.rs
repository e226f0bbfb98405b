//! Per-tick inputs and the ego vehicle state derived from them

use crate::common::{KinematicState1D, Path2D, PlannerResult};
use crate::prediction::vehicle_tracker::SensorFusionReading;

/// Everything the simulator reports in one message
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub x: f64,
    pub y: f64,
    pub s: f64,
    pub d: f64,
    /// Heading [rad]
    pub yaw: f64,
    /// Speed [mph]
    pub speed: f64,
    /// Points of the last output not yet driven
    pub previous_path: Path2D,
    pub end_path_s: f64,
    pub end_path_d: f64,
    pub sensor_fusion: Vec<SensorFusionReading>,
}

impl Telemetry {
    /// Ego pose with nothing left of the previous path and no traffic
    pub fn new(x: f64, y: f64, s: f64, d: f64, yaw: f64, speed: f64) -> Self {
        Telemetry {
            x,
            y,
            s,
            d,
            yaw,
            speed,
            previous_path: Path2D::new(),
            end_path_s: s,
            end_path_d: d,
            sensor_fusion: Vec::new(),
        }
    }

    pub fn with_previous_path(mut self, previous_path: Path2D, end_path_s: f64, end_path_d: f64) -> Self {
        self.previous_path = previous_path;
        self.end_path_s = end_path_s;
        self.end_path_d = end_path_d;
        self
    }

    pub fn with_sensor_fusion(mut self, sensor_fusion: Vec<SensorFusionReading>) -> Self {
        self.sensor_fusion = sensor_fusion;
        self
    }
}

/// Parse raw `[id, x, y, vx, vy, s, d]` rows, failing on the first short row
pub fn parse_sensor_fusion<R: AsRef<[f64]>>(rows: &[R]) -> PlannerResult<Vec<SensorFusionReading>> {
    rows.iter().map(|row| SensorFusionReading::from_row(row.as_ref())).collect()
}

/// Ego kinematics at the point planning starts from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EgoVehicleState {
    pub s: KinematicState1D,
    pub d: KinematicState1D,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub speed: f64,
    /// Governed speed of the emitted path [mph]
    pub reference_velocity: f64,
}

impl EgoVehicleState {
    pub fn new() -> Self {
        EgoVehicleState {
            s: KinematicState1D::at_rest(0.0),
            d: KinematicState1D::at_rest(0.0),
            x: 0.0,
            y: 0.0,
            yaw: 0.0,
            speed: 0.0,
            reference_velocity: 0.0,
        }
    }

    /// Take the pose from `telemetry` and restart the Frenet kinematics at
    /// `(start_s, start_d)` moving along the road at `longitudinal_velocity`.
    pub fn update(&mut self, telemetry: &Telemetry, start_s: f64, start_d: f64, longitudinal_velocity: f64) {
        self.x = telemetry.x;
        self.y = telemetry.y;
        self.yaw = telemetry.yaw;
        self.speed = telemetry.speed;
        self.s = KinematicState1D::new(start_s, longitudinal_velocity, 0.0);
        self.d = KinematicState1D::at_rest(start_d);
    }
}

impl Default for EgoVehicleState {
    fn default() -> Self {
        Self::new()
    }
}
