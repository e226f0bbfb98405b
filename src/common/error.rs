//! Error types for highway_planner

use thiserror::Error;

/// Main error type for the planning pipeline
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Polynomial duration was zero, negative or not finite
    #[error("Invalid trajectory duration: {0}")]
    InvalidDuration(f64),
    /// Boundary-condition matrix could not be inverted
    #[error("Numerical error: boundary condition matrix is singular")]
    SingularSystem,
    /// No candidate trajectory produced a finite cost
    #[error("Planning error: no feasible trajectory")]
    NoFeasibleTrajectory,
    /// Prediction requested for a vehicle id never observed
    #[error("Unknown vehicle id {0}")]
    UnknownVehicle(u32),
    /// Finite differencing over a non-positive time step
    #[error("Invalid time step: {0}")]
    InvalidTimestep(f64),
    /// Sensor fusion row with too few fields
    #[error("Sensor fusion row has {0} fields, expected 7")]
    InvalidSensorReading(usize),
    /// Waypoint list unusable as a road map
    #[error("Invalid road map: {0}")]
    InvalidMap(String),
    /// Trajectory generation overran the per-tick budget
    #[error("Planning took {elapsed_ms} ms, budget is {budget_ms} ms")]
    DeadlineExceeded { elapsed_ms: u128, budget_ms: u128 },
    /// Configuration file could not be read
    #[error("Cannot load the configuration file: {0}")]
    ConfigLoad(#[from] std::io::Error),
    /// Configuration file could not be parsed
    #[error("Cannot parse the configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type alias for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
