//! Longitudinal control
//!
//! Comfort-limited speed governor applied to every output sample.

pub mod speed_governor;

pub use speed_governor::{skip_time, AccelerationProfile, Direction, SpeedGovernor, MPH_TO_MPS};
