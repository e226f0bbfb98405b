// Per-tick orchestration of the planning pipeline

pub mod telemetry;
pub mod session;

pub use telemetry::{parse_sensor_fusion, EgoVehicleState, Telemetry};
pub use session::PlannerSession;
