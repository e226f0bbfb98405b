// Trajectory generation module

pub mod quintic_polynomials;
pub mod target_state;
pub mod cost_functions;
pub mod goal_sampler;
pub mod trajectory_planner;

pub use quintic_polynomials::{solve, QuinticPolynomial, Trajectory};
pub use target_state::{Goal, TargetState};
pub use cost_functions::{logistic, CostEvaluator, NO_VEHICLE_DISTANCE};
pub use goal_sampler::GaussianGoalSampler;
pub use trajectory_planner::TrajectoryPlanner;
