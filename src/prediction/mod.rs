// Prediction of surrounding traffic

pub mod vehicle_tracker;

pub use vehicle_tracker::{SensorFusionReading, TrackedVehicle, VehicleTracker};
