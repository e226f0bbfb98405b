// Behavior layer: lane selection

pub mod behavior_planner;

pub use behavior_planner::{BehaviorPlanner, BehaviorState, LaneDescriptor, N_LANES};
