//! highway_planner - trajectory generation and lane selection for highway driving
//!
//! This crate plans jerk-minimal Frenet trajectories among surrounding
//! traffic, chooses lanes with a cooldown-guarded state machine and turns the
//! result into Cartesian points for a downstream controller.

// Core modules
pub mod common;
pub mod config;
pub mod utils;

// Planning pipeline
pub mod trajectory;
pub mod prediction;
pub mod behavior;
pub mod control;
pub mod mapping;
pub mod planner;

// Re-export common types for convenience
pub use common::{KinematicState1D, Point2D, Path2D};
pub use common::{GoalSampler, RoadMap};
pub use common::{PlannerError, PlannerResult};
pub use config::PlannerConfig;
pub use mapping::WaypointMap;
pub use planner::{PlannerSession, Telemetry};
