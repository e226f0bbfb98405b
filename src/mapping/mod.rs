// Road geometry

pub mod waypoint_map;

pub use waypoint_map::WaypointMap;
