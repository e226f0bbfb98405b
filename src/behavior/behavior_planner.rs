/*!
 * Lane selection state machine
 *
 * Three fixed lanes, evaluated against the last winning trajectory. After
 * start-up and after every committed lane change the planner holds its
 * choice until a deadline passes, which keeps it from oscillating between
 * lanes of similar cost.
 */

use std::fmt;
use std::ops::RangeInclusive;
use std::time::Instant;

use log::{debug, info};

use crate::config::{seconds, BehaviorConfig};
use crate::trajectory::cost_functions::CostEvaluator;
use crate::trajectory::quintic_polynomials::Trajectory;

pub const N_LANES: usize = 3;

/// One lane of the road, id 0 is leftmost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneDescriptor {
    pub id: usize,
    pub center_d: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BehaviorState {
    /// Committed lane is frozen until the deadline
    Holding { deadline: Instant },
    Evaluating,
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BehaviorState::Holding { .. } => write!(f, "Holding"),
            BehaviorState::Evaluating => write!(f, "Evaluating"),
        }
    }
}

pub struct BehaviorPlanner {
    config: BehaviorConfig,
    lanes: [LaneDescriptor; N_LANES],
    committed: usize,
    deadline: Instant,
    state: BehaviorState,
    lane_changes: usize,
}

impl BehaviorPlanner {
    /// Start in the center lane, holding for the initial lock
    pub fn new(config: BehaviorConfig, now: Instant) -> Self {
        let mut lanes = [LaneDescriptor { id: 0, center_d: 0.0, cost: 0.0 }; N_LANES];
        for (id, lane) in lanes.iter_mut().enumerate() {
            lane.id = id;
            lane.center_d = config.lane_width * (id as f64 + 0.5);
        }
        let deadline = now + seconds(config.initial_hold);
        BehaviorPlanner {
            config,
            lanes,
            committed: 1,
            deadline,
            state: BehaviorState::Holding { deadline },
            lane_changes: 0,
        }
    }

    pub fn lanes(&self) -> &[LaneDescriptor; N_LANES] {
        &self.lanes
    }

    pub fn committed_lane(&self) -> LaneDescriptor {
        self.lanes[self.committed]
    }

    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Number of committed lane changes so far
    pub fn lane_changes(&self) -> usize {
        self.lane_changes
    }

    /// Lane whose band contains `d`, clamped to the road
    pub fn lane_for_d(&self, d: f64) -> usize {
        let width = self.config.lane_width;
        if !(width > 0.0) || !d.is_finite() || d < 0.0 {
            return 0;
        }
        ((d / width).floor() as usize).min(N_LANES - 1)
    }

    /// Lanes reachable from `current` in one change
    pub fn candidate_lanes(current: usize) -> RangeInclusive<usize> {
        let current = current.min(N_LANES - 1);
        current.saturating_sub(1)..=(current + 1).min(N_LANES - 1)
    }

    /// Accumulate costs for every lane reachable from the occupied one
    pub fn update_lane_costs(&mut self, trajectory: &Trajectory, ego_d: f64, evaluator: &CostEvaluator) {
        let occupied = self.lane_for_d(ego_d);
        for id in Self::candidate_lanes(occupied) {
            let lane = &mut self.lanes[id];
            let shifted = trajectory.with_lateral_goal(lane.center_d);
            if id == occupied {
                lane.cost += self.config.current_lane_front_weight * evaluator.buffer_cost_front(&shifted);
            } else {
                lane.cost += evaluator.collision_cost(&shifted) + evaluator.buffer_cost(&shifted);
            }
            debug!("Lane {} cost {:.4}", id, lane.cost);
        }
    }

    /// Cheapest lane reachable from `current`, lowest id on ties
    pub fn find_best_lane(&self, current: usize) -> LaneDescriptor {
        let mut range = Self::candidate_lanes(current);
        let first = *range.start();
        let mut best = self.lanes[first];
        range.next();
        for id in range {
            if self.lanes[id].cost < best.cost {
                best = self.lanes[id];
            }
        }
        best
    }

    fn reset_costs(&mut self) {
        for lane in self.lanes.iter_mut() {
            lane.cost = 0.0;
        }
    }

    /// Run one step of the state machine and return the lane to drive in.
    ///
    /// Lanes are only evaluated once the lock has expired and the reference
    /// velocity is inside the cruise band. A lane different from the
    /// committed one is adopted immediately and starts a new cooldown.
    pub fn update_behavior_state(
        &mut self,
        now: Instant,
        reference_velocity: f64,
        ego_d: f64,
        trajectory: &Trajectory,
        evaluator: &CostEvaluator,
    ) -> LaneDescriptor {
        let [low, high] = self.config.cruise_band;
        let cruising = reference_velocity >= low && reference_velocity <= high;
        if now < self.deadline || !cruising {
            self.state = BehaviorState::Holding { deadline: self.deadline };
            return self.committed_lane();
        }

        self.state = BehaviorState::Evaluating;
        self.update_lane_costs(trajectory, ego_d, evaluator);
        let best = self.find_best_lane(self.lane_for_d(ego_d));
        self.reset_costs();

        if best.id != self.committed {
            info!(
                "Lane change {} -> {} (cost {:.4}), holding for {:.1}s",
                self.committed, best.id, best.cost, self.config.cooldown
            );
            self.committed = best.id;
            self.deadline = now + seconds(self.config.cooldown);
            self.state = BehaviorState::Holding { deadline: self.deadline };
            self.lane_changes += 1;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::KinematicState1D;
    use crate::config::{CostConfig, TrajectoryConfig};
    use crate::prediction::vehicle_tracker::{SensorFusionReading, VehicleTracker};
    use crate::trajectory::target_state::TargetState;
    use approx::assert_abs_diff_eq;
    use std::time::Duration;

    fn lane_keeping(d: f64) -> Trajectory {
        Trajectory::between(
            &[0.0, 7.0, 0.0].into(),
            &[d, 0.0, 0.0].into(),
            &[42.0, 7.0, 0.0].into(),
            &[d, 0.0, 0.0].into(),
            6.0,
        ).unwrap()
    }

    fn parked(id: u32, s: f64, d: f64) -> SensorFusionReading {
        SensorFusionReading { id, x: 0.0, y: 0.0, vx: 0.0, vy: 0.0, s, d }
    }

    fn set_costs(planner: &mut BehaviorPlanner, costs: [f64; 3]) {
        for (lane, cost) in planner.lanes.iter_mut().zip(costs.iter()) {
            lane.cost = *cost;
        }
    }

    #[test]
    fn test_initial_state() {
        let now = Instant::now();
        let planner = BehaviorPlanner::new(BehaviorConfig::default(), now);
        assert_eq!(planner.committed_lane().id, 1);
        assert_abs_diff_eq!(planner.committed_lane().center_d, 6.0);
        assert_eq!(planner.deadline(), now + Duration::from_secs(5));
        assert_eq!(planner.state().to_string(), "Holding");
    }

    #[test]
    fn test_lane_for_d() {
        let planner = BehaviorPlanner::new(BehaviorConfig::default(), Instant::now());
        assert_eq!(planner.lane_for_d(1.0), 0);
        assert_eq!(planner.lane_for_d(4.0), 1);
        assert_eq!(planner.lane_for_d(9.9), 2);
        assert_eq!(planner.lane_for_d(15.0), 2);
        assert_eq!(planner.lane_for_d(-1.0), 0);
    }

    #[test]
    fn test_tie_break_prefers_lowest_id() {
        let mut planner = BehaviorPlanner::new(BehaviorConfig::default(), Instant::now());
        set_costs(&mut planner, [0.3, 0.3, 0.3]);
        assert_eq!(planner.find_best_lane(1).id, 0);
        assert_eq!(planner.find_best_lane(2).id, 1);
    }

    #[test]
    fn test_adjacency_restriction() {
        let mut planner = BehaviorPlanner::new(BehaviorConfig::default(), Instant::now());
        set_costs(&mut planner, [1.0, 0.9, 0.0]);
        assert_eq!(planner.find_best_lane(0).id, 1);
        set_costs(&mut planner, [0.0, 0.9, 1.0]);
        assert_eq!(planner.find_best_lane(2).id, 1);
        assert_eq!(planner.find_best_lane(1).id, 0);
    }

    #[test]
    fn test_holds_outside_cruise_band() {
        let start = Instant::now();
        let mut planner = BehaviorPlanner::new(BehaviorConfig::default(), start);
        let config = CostConfig { collision_radius_factor: 2.0, ..CostConfig::default() };
        let mut tracker = VehicleTracker::new(0.0, 10);
        tracker.update(&[parked(0, 10.0, 6.0)], None).unwrap();
        let target = TargetState::new(KinematicState1D::new(0.0, 7.0, 0.0), KinematicState1D::at_rest(6.0));
        let eval = CostEvaluator::new(&config, &TrajectoryConfig::default(), &tracker, &target);
        let traj = lane_keeping(6.0);

        let later = start + Duration::from_secs(6);
        assert_eq!(planner.update_behavior_state(later, 20.0, 6.0, &traj, &eval).id, 1);
        assert_eq!(planner.update_behavior_state(later, 48.0, 6.0, &traj, &eval).id, 1);
        assert_eq!(planner.lane_changes(), 0);
    }

    #[test]
    fn test_blocked_lane_triggers_change_and_cooldown() {
        let start = Instant::now();
        let mut planner = BehaviorPlanner::new(BehaviorConfig::default(), start);
        let config = CostConfig { collision_radius_factor: 2.0, ..CostConfig::default() };
        let mut tracker = VehicleTracker::new(0.0, 10);
        tracker.update(&[parked(0, 10.0, 6.0)], None).unwrap();
        let target = TargetState::new(KinematicState1D::new(0.0, 7.0, 0.0), KinematicState1D::at_rest(6.0));
        let eval = CostEvaluator::new(&config, &TrajectoryConfig::default(), &tracker, &target);
        let traj = lane_keeping(6.0);

        // still inside the initial hold
        let early = start + Duration::from_secs(1);
        assert_eq!(planner.update_behavior_state(early, 35.0, 6.0, &traj, &eval).id, 1);

        let t1 = start + Duration::from_secs(6);
        let chosen = planner.update_behavior_state(t1, 35.0, 6.0, &traj, &eval);
        assert_eq!(chosen.id, 0);
        assert_eq!(planner.committed_lane().id, 0);
        assert_eq!(planner.deadline(), t1 + Duration::from_secs(8));
        assert!(planner.lanes().iter().all(|l| l.cost == 0.0));

        // the blocker moves into lane 0, leaving lane 1 strictly cheapest
        let mut moved = VehicleTracker::new(0.0, 10);
        moved.update(&[parked(0, 10.0, 2.0)], None).unwrap();
        let eval = CostEvaluator::new(&config, &TrajectoryConfig::default(), &moved, &target);
        let t2 = t1 + Duration::from_secs(3);
        assert_eq!(planner.update_behavior_state(t2, 35.0, 6.0, &traj, &eval).id, 0);
        assert_eq!(planner.committed_lane().id, 0);
        assert_eq!(planner.lane_changes(), 1);

        let t3 = planner.deadline();
        assert_eq!(planner.update_behavior_state(t3, 35.0, 6.0, &traj, &eval).id, 1);
        assert_eq!(planner.lane_changes(), 2);
        assert_eq!(planner.deadline(), t3 + Duration::from_secs(8));
    }

    #[test]
    fn test_free_lane_is_kept() {
        let start = Instant::now();
        let mut planner = BehaviorPlanner::new(BehaviorConfig::default(), start);
        let config = CostConfig::default();
        let tracker = VehicleTracker::new(0.0, 10);
        let target = TargetState::new(KinematicState1D::new(0.0, 7.0, 0.0), KinematicState1D::at_rest(6.0));
        let eval = CostEvaluator::new(&config, &TrajectoryConfig::default(), &tracker, &target);
        let traj = lane_keeping(6.0);

        let later = start + Duration::from_secs(10);
        let chosen = planner.update_behavior_state(later, 35.0, 6.0, &traj, &eval);
        assert_eq!(chosen.id, 1);
        assert_eq!(planner.state(), BehaviorState::Evaluating);
        assert_eq!(planner.deadline(), start + Duration::from_secs(5));
    }
}
