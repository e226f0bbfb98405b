//! Tracking of surrounding vehicles from sensor fusion
//!
//! Each vehicle keeps its current and previous raw reading plus Frenet
//! kinematics obtained by finite differencing consecutive sightings. Future
//! positions are predicted with a constant-acceleration model in Frenet space.

use std::collections::BTreeMap;

use log::{debug, trace};

use crate::common::{KinematicState1D, PlannerError, PlannerResult};

/// Fields in a raw sensor fusion row `[id, x, y, vx, vy, s, d]`
const SENSOR_FUSION_FIELDS: usize = 7;

/// One vehicle as reported by sensor fusion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFusionReading {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub s: f64,
    pub d: f64,
}

impl SensorFusionReading {
    /// Parse a raw `[id, x, y, vx, vy, s, d]` row
    pub fn from_row(row: &[f64]) -> PlannerResult<Self> {
        if row.len() < SENSOR_FUSION_FIELDS {
            return Err(PlannerError::InvalidSensorReading(row.len()));
        }
        Ok(SensorFusionReading {
            id: row[0] as u32,
            x: row[1],
            y: row[2],
            vx: row[3],
            vy: row[4],
            s: row[5],
            d: row[6],
        })
    }

    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedVehicle {
    pub id: u32,
    pub current: SensorFusionReading,
    pub previous: Option<SensorFusionReading>,
    /// Longitudinal kinematics
    pub s: KinematicState1D,
    /// Lateral kinematics
    pub d: KinematicState1D,
    since_seen: f64,
    missed_updates: u64,
}

impl TrackedVehicle {
    fn first_sighting(reading: SensorFusionReading) -> Self {
        // No history yet: assume the whole speed is along the road
        TrackedVehicle {
            id: reading.id,
            current: reading,
            previous: None,
            s: KinematicState1D::new(reading.s, reading.speed(), 0.0),
            d: KinematicState1D::at_rest(reading.d),
            since_seen: 0.0,
            missed_updates: 0,
        }
    }

    /// Current reading becomes the previous one, `reading` the current one.
    fn observe(&mut self, reading: SensorFusionReading, max_s: f64) -> PlannerResult<()> {
        let dt = self.since_seen;
        let ds = unwrap_delta(reading.s - self.current.s, max_s);
        let mut s = self.s.advanced_by(ds, dt)?;
        let d = self.d.advanced_by(reading.d - self.current.d, dt)?;
        s.position = reading.s;

        self.previous = Some(self.current);
        self.current = reading;
        self.s = s;
        self.d = d;
        self.since_seen = 0.0;
        self.missed_updates = 0;
        Ok(())
    }

    /// Predicted `(s, d)` kinematics `t` seconds after the last sighting
    pub fn state_in(&self, t: f64) -> (KinematicState1D, KinematicState1D) {
        (self.s.project(t), self.d.project(t))
    }

    /// Predicted Frenet position `t` seconds after the last sighting
    pub fn position_in(&self, t: f64) -> (f64, f64) {
        let (s, d) = self.state_in(t);
        (s.position, d.position)
    }
}

/// Shortest signed distance along a looped track
pub(crate) fn unwrap_delta(delta: f64, max_s: f64) -> f64 {
    if max_s <= 0.0 {
        return delta;
    }
    if delta > max_s / 2.0 {
        delta - max_s
    } else if delta < -max_s / 2.0 {
        delta + max_s
    } else {
        delta
    }
}

/// Map of every vehicle seen during the session
#[derive(Debug, Clone)]
pub struct VehicleTracker {
    vehicles: BTreeMap<u32, TrackedVehicle>,
    max_s: f64,
    stale_after: u64,
}

impl VehicleTracker {
    pub fn new(max_s: f64, stale_after: u64) -> Self {
        VehicleTracker {
            vehicles: BTreeMap::new(),
            max_s,
            stale_after,
        }
    }

    /// Ingest one tick of sensor fusion taken `dt` seconds after the previous one.
    ///
    /// `dt` is `None` on the first tick. A non-positive `dt` leaves the
    /// tracker untouched and reports `InvalidTimestep`.
    pub fn update(&mut self, readings: &[SensorFusionReading], dt: Option<f64>) -> PlannerResult<()> {
        if let Some(dt) = dt {
            if dt <= 0.0 || !dt.is_finite() {
                return Err(PlannerError::InvalidTimestep(dt));
            }
            for vehicle in self.vehicles.values_mut() {
                vehicle.since_seen += dt;
                vehicle.missed_updates += 1;
            }
        }

        for reading in readings {
            match self.vehicles.get_mut(&reading.id) {
                Some(vehicle) if vehicle.since_seen > 0.0 => {
                    vehicle.observe(*reading, self.max_s)?;
                }
                Some(vehicle) => {
                    // Same instant, nothing to difference against
                    vehicle.current = *reading;
                    vehicle.missed_updates = 0;
                }
                None => {
                    trace!("Tracking new vehicle {}", reading.id);
                    self.vehicles.insert(reading.id, TrackedVehicle::first_sighting(*reading));
                }
            }
        }

        let stale_after = self.stale_after;
        let before = self.vehicles.len();
        self.vehicles.retain(|_, v| v.missed_updates < stale_after);
        if self.vehicles.len() != before {
            debug!("Evicted {} stale vehicles", before - self.vehicles.len());
        }
        Ok(())
    }

    /// Predicted `(s, d)` kinematics of vehicle `id` after `t` seconds
    pub fn predict_target_state(
        &self,
        id: u32,
        t: f64,
    ) -> PlannerResult<(KinematicState1D, KinematicState1D)> {
        self.vehicles
            .get(&id)
            .map(|v| v.state_in(t))
            .ok_or(PlannerError::UnknownVehicle(id))
    }

    pub fn get(&self, id: u32) -> Option<&TrackedVehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &TrackedVehicle> {
        self.vehicles.values()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn reading(id: u32, s: f64, d: f64) -> SensorFusionReading {
        SensorFusionReading { id, x: 0.0, y: 0.0, vx: 20.0, vy: 0.0, s, d }
    }

    #[test]
    fn test_from_row() {
        let r = SensorFusionReading::from_row(&[3.0, 1.0, 2.0, 3.0, 4.0, 100.0, 6.0]).unwrap();
        assert_eq!(r.id, 3);
        assert_eq!(r.speed(), 5.0);
        assert!(matches!(
            SensorFusionReading::from_row(&[1.0, 2.0]),
            Err(PlannerError::InvalidSensorReading(2))
        ));
    }

    #[test]
    fn test_first_sighting_seeds_velocity() {
        let mut tracker = VehicleTracker::new(0.0, 10);
        tracker.update(&[reading(1, 50.0, 6.0)], None).unwrap();
        let v = tracker.get(1).unwrap();
        assert_eq!(v.s.velocity, 20.0);
        assert_eq!(v.d.velocity, 0.0);
        assert!(v.previous.is_none());
    }

    #[test]
    fn test_finite_difference_update() {
        let mut tracker = VehicleTracker::new(0.0, 10);
        tracker.update(&[reading(1, 50.0, 6.0)], None).unwrap();
        tracker.update(&[reading(1, 60.0, 6.5)], Some(0.5)).unwrap();
        let v = tracker.get(1).unwrap();
        assert_abs_diff_eq!(v.s.position, 60.0);
        assert_abs_diff_eq!(v.s.velocity, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(v.s.acceleration, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(v.d.velocity, 1.0, epsilon = 1e-9);
        assert_eq!(v.previous.unwrap().s, 50.0);
    }

    #[test]
    fn test_zero_dt_is_rejected_without_side_effects() {
        let mut tracker = VehicleTracker::new(0.0, 10);
        tracker.update(&[reading(1, 50.0, 6.0)], None).unwrap();
        let before = tracker.get(1).unwrap().clone();
        let result = tracker.update(&[reading(1, 70.0, 6.0)], Some(0.0));
        assert!(matches!(result, Err(PlannerError::InvalidTimestep(_))));
        assert_eq!(tracker.get(1).unwrap(), &before);
    }

    #[test]
    fn test_wrap_around_is_unwrapped() {
        let mut tracker = VehicleTracker::new(1000.0, 10);
        tracker.update(&[reading(1, 995.0, 6.0)], None).unwrap();
        tracker.update(&[reading(1, 5.0, 6.0)], Some(0.5)).unwrap();
        let v = tracker.get(1).unwrap();
        assert_abs_diff_eq!(v.s.velocity, 20.0, epsilon = 1e-9);
        assert_abs_diff_eq!(v.s.position, 5.0);
    }

    #[test]
    fn test_prediction_and_unknown_vehicle() {
        let mut tracker = VehicleTracker::new(0.0, 10);
        tracker.update(&[reading(4, 10.0, 2.0)], None).unwrap();
        let (s, d) = tracker.predict_target_state(4, 2.0).unwrap();
        assert_abs_diff_eq!(s.position, 50.0);
        assert_abs_diff_eq!(d.position, 2.0);
        assert!(matches!(tracker.predict_target_state(9, 1.0), Err(PlannerError::UnknownVehicle(9))));
    }

    #[test]
    fn test_stale_vehicles_are_evicted() {
        let mut tracker = VehicleTracker::new(0.0, 2);
        tracker.update(&[reading(1, 10.0, 2.0), reading(2, 30.0, 6.0)], None).unwrap();
        tracker.update(&[reading(2, 40.0, 6.0)], Some(0.5)).unwrap();
        assert_eq!(tracker.len(), 2);
        tracker.update(&[reading(2, 50.0, 6.0)], Some(0.5)).unwrap();
        assert_eq!(tracker.len(), 1);
        assert!(tracker.get(1).is_none());
    }
}
