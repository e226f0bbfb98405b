/*!
 * Planner session
 *
 * Owns every piece of state that has to survive between telemetry messages
 * and runs one planning cycle per message:
 *
 * 1. keep the head of the previous output and find where planning starts
 * 2. update the tracked vehicles
 * 3. pick a lane and lock the horizon while a lane change is in progress
 * 4. slow down the longitudinal target if a vehicle is close ahead
 * 5. search for the cheapest trajectory
 * 6. sample it with the speed governor and convert it to Cartesian points
 *
 * A failing cycle never escapes `tick`: the unconsumed part of the previous
 * output is driven instead.
 */

use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::behavior::behavior_planner::{BehaviorPlanner, LaneDescriptor};
use crate::common::{GoalSampler, KinematicState1D, Path2D, PlannerError, PlannerResult, RoadMap};
use crate::config::{seconds, PlannerConfig};
use crate::control::speed_governor::{skip_time, SpeedGovernor, MPH_TO_MPS};
use crate::planner::telemetry::{EgoVehicleState, Telemetry};
use crate::prediction::vehicle_tracker::{unwrap_delta, VehicleTracker};
use crate::trajectory::cost_functions::CostEvaluator;
use crate::trajectory::goal_sampler::GaussianGoalSampler;
use crate::trajectory::quintic_polynomials::Trajectory;
use crate::trajectory::target_state::TargetState;
use crate::trajectory::trajectory_planner::TrajectoryPlanner;

pub struct PlannerSession<G: GoalSampler = GaussianGoalSampler> {
    config: PlannerConfig,
    tracker: VehicleTracker,
    behavior: BehaviorPlanner,
    trajectory_planner: TrajectoryPlanner<G>,
    governor: SpeedGovernor,
    ego: EgoVehicleState,
    target: Option<TargetState>,
    target_lane: usize,
    lane_change_state: bool,
    following: bool,
    /// Reference velocity of every point of the last emitted path
    velocity_profile: Vec<f64>,
    last_plan: Option<Instant>,
    last_sensor_update: Option<Instant>,
    plans: u64,
    failures: u64,
}

impl PlannerSession<GaussianGoalSampler> {
    pub fn new(config: PlannerConfig, now: Instant) -> Self {
        let trajectory = &config.trajectory;
        let sampler = GaussianGoalSampler::new(trajectory.sigma_s, trajectory.sigma_d, trajectory.seed);
        Self::with_sampler(config, sampler, now)
    }
}

impl<G: GoalSampler> PlannerSession<G> {
    pub fn with_sampler(config: PlannerConfig, sampler: G, now: Instant) -> Self {
        let tracker = VehicleTracker::new(config.session.max_s, config.session.stale_after_ticks);
        let behavior = BehaviorPlanner::new(config.behavior.clone(), now);
        let trajectory_planner = TrajectoryPlanner::with_sampler(config.trajectory.clone(), sampler);
        let governor = SpeedGovernor::new(&config.governor);
        let target_lane = behavior.committed_lane().id;
        info!(
            "Planner session started in lane {}, horizon {:.1}s, {} samples per goal time",
            target_lane, config.trajectory.horizon, config.trajectory.trajectory_samples
        );

        PlannerSession {
            config,
            tracker,
            behavior,
            trajectory_planner,
            governor,
            ego: EgoVehicleState::new(),
            target: None,
            target_lane,
            lane_change_state: false,
            following: false,
            velocity_profile: Vec::new(),
            last_plan: None,
            last_sensor_update: None,
            plans: 0,
            failures: 0,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn ego(&self) -> &EgoVehicleState {
        &self.ego
    }

    pub fn tracker(&self) -> &VehicleTracker {
        &self.tracker
    }

    pub fn behavior(&self) -> &BehaviorPlanner {
        &self.behavior
    }

    pub fn trajectory_planner(&self) -> &TrajectoryPlanner<G> {
        &self.trajectory_planner
    }

    /// Target of the last successful plan
    pub fn target(&self) -> Option<&TargetState> {
        self.target.as_ref()
    }

    pub fn lane_change_state(&self) -> bool {
        self.lane_change_state
    }

    /// A vehicle close ahead slowed the last plan down
    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Planning cycles run so far, failed ones included
    pub fn plans(&self) -> u64 {
        self.plans
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Handle one telemetry message and return the path to drive
    pub fn tick<R: RoadMap + ?Sized>(&mut self, telemetry: &Telemetry, road: &R, now: Instant) -> Path2D {
        if let Some(last) = self.last_plan {
            if now.saturating_duration_since(last) < seconds(self.config.session.replan_interval) {
                trace!("Within replan interval, re-emitting {} points", telemetry.previous_path.len());
                return telemetry.previous_path.clone();
            }
        }
        self.last_plan = Some(now);
        self.plans += 1;

        match self.plan(telemetry, road, now) {
            Ok(path) => path,
            Err(e) => {
                self.failures += 1;
                error!("Planning cycle {} failed, keeping the previous path: {}", self.plans, e);
                let consumed = self.consumed_points(telemetry);
                self.velocity_profile = self.velocity_profile.split_off(consumed);
                telemetry.previous_path.clone()
            }
        }
    }

    fn plan<R: RoadMap + ?Sized>(&mut self, telemetry: &Telemetry, road: &R, now: Instant) -> PlannerResult<Path2D> {
        let session = self.config.session.clone();
        let timestep = self.config.trajectory.timestep;
        if !(timestep > 0.0) {
            return Err(PlannerError::InvalidTimestep(timestep));
        }

        // Continue from the last retained point of the previous output
        let retained = telemetry.previous_path.head(session.previous_path_keeps);
        let (start_s, start_d) = match retained.last() {
            Some(end) => {
                let heading = retained.end_heading().unwrap_or(telemetry.yaw);
                road.to_frenet(end.x, end.y, heading)
            }
            None => (telemetry.s, telemetry.d),
        };

        let dt = self.last_sensor_update.map(|t| now.saturating_duration_since(t).as_secs_f64());
        match self.tracker.update(&telemetry.sensor_fusion, dt) {
            Ok(()) => self.last_sensor_update = Some(now),
            Err(e) => warn!("Skipping sensor fusion update: {}", e),
        }

        let reference_velocity = self.resume_velocity(telemetry, retained.len());
        let max_reference = self.governor.max_reference_velocity();
        let longitudinal = if max_reference > 0.0 {
            session.cruise_goal_velocity * reference_velocity / max_reference
        } else {
            0.0
        };
        self.ego.update(telemetry, start_s, start_d, longitudinal);
        self.ego.reference_velocity = reference_velocity;

        let prior = self
            .trajectory_planner
            .last_trajectory()
            .map(|traj| rebase(traj, start_s, session.max_s));

        let lane = match prior {
            Some(ref traj) => {
                let lane_target = TargetState::new(
                    self.ego.s,
                    KinematicState1D::at_rest(self.behavior.committed_lane().center_d),
                );
                let evaluator = CostEvaluator::new(&self.config.cost, &self.config.trajectory, &self.tracker, &lane_target);
                self.behavior.update_behavior_state(now, reference_velocity, telemetry.d, traj, &evaluator)
            }
            None => self.behavior.committed_lane(),
        };
        let lane_changing = self.update_lane_lock(lane, telemetry.d);
        let horizon = if lane_changing {
            self.config.trajectory.lane_change_horizon
        } else {
            self.config.trajectory.horizon
        };

        let following = match prior {
            Some(ref traj) => {
                let lane_target = TargetState::new(self.ego.s, KinematicState1D::at_rest(lane.center_d));
                let evaluator = CostEvaluator::new(&self.config.cost, &self.config.trajectory, &self.tracker, &lane_target);
                evaluator.buffer_cost_front(traj) >= 1.0
            }
            None => false,
        };
        let goal_velocity = if following {
            session.slow_goal_velocity
        } else {
            session.cruise_goal_velocity
        };
        let target = TargetState::new(
            KinematicState1D::new(start_s, goal_velocity, 0.0),
            KinematicState1D::at_rest(lane.center_d),
        );

        let started = Instant::now();
        let best = {
            let evaluator = CostEvaluator::new(&self.config.cost, &self.config.trajectory, &self.tracker, &target);
            self.trajectory_planner.generate(&self.ego.s, &self.ego.d, horizon, &evaluator)?
        };
        let elapsed = started.elapsed();
        let budget = Duration::from_millis(session.planning_budget_ms);
        if elapsed > budget {
            return Err(PlannerError::DeadlineExceeded {
                elapsed_ms: elapsed.as_millis(),
                budget_ms: budget.as_millis(),
            });
        }
        debug!(
            "Lane {} T={:.2} goal velocity {:.1} winner {:.2}{} in {} ms",
            lane.id,
            best.t,
            goal_velocity,
            average_velocity(&best),
            if following { " (following)" } else { "" },
            elapsed.as_millis()
        );
        self.target = Some(target);
        self.following = following;

        let skip = skip_time(&session.skip_time, reference_velocity, lane_changing, following, best.t, timestep);
        let n_points = ((best.t - skip) / timestep + 1e-9).floor().max(0.0) as usize;
        let target_velocity = self.governor.target_for(average_velocity(&best), session.cruise_goal_velocity);

        let consumed = self.consumed_points(telemetry);
        let mut profile: Vec<f64> = (0..retained.len())
            .map(|i| self.velocity_profile.get(consumed + i).copied().unwrap_or(reference_velocity))
            .collect();
        let mut path = retained;
        let mut velocity = reference_velocity;
        let mut s = start_s;
        for k in 0..n_points {
            let t = skip + k as f64 * timestep;
            velocity = self.governor.advance(velocity, target_velocity);
            s += velocity * MPH_TO_MPS * timestep;
            let d = best.d.calc_point(t);
            path.push(road.to_cartesian(wrap_s(s, session.max_s), d));
            profile.push(velocity);
        }
        self.velocity_profile = profile;
        Ok(path)
    }

    /// Points of the last emitted path the vehicle has already driven
    fn consumed_points(&self, telemetry: &Telemetry) -> usize {
        self.velocity_profile.len().saturating_sub(telemetry.previous_path.len())
    }

    /// Reference velocity at the last retained point, or the measured speed
    /// when nothing of the previous output is kept.
    fn resume_velocity(&self, telemetry: &Telemetry, retained: usize) -> f64 {
        let consumed = self.consumed_points(telemetry);
        retained
            .checked_sub(1)
            .and_then(|last| self.velocity_profile.get(consumed + last).copied())
            .unwrap_or(telemetry.speed)
            .max(0.0)
            .min(self.governor.max_reference_velocity())
    }

    /// Lock the lane change horizon when the target lane changes and release
    /// it once the vehicle is close to the new lane center.
    fn update_lane_lock(&mut self, lane: LaneDescriptor, ego_d: f64) -> bool {
        if lane.id != self.target_lane {
            info!("Target lane {} -> {}", self.target_lane, lane.id);
            self.target_lane = lane.id;
            self.lane_change_state = true;
        } else if self.lane_change_state
            && (ego_d - lane.center_d).abs() <= self.config.session.lane_settle_tolerance
        {
            debug!("Settled in lane {}", lane.id);
            self.lane_change_state = false;
        }
        self.lane_change_state
    }
}

/// Mean longitudinal velocity over the whole trajectory
fn average_velocity(traj: &Trajectory) -> f64 {
    (traj.s.calc_point(traj.t) - traj.s.calc_point(0.0)) / traj.t
}

/// Move a trajectory along the road so that it starts at `start_s`
fn rebase(traj: &Trajectory, start_s: f64, max_s: f64) -> Trajectory {
    let offset = unwrap_delta(start_s - traj.s.calc_point(0.0), max_s);
    Trajectory::new(traj.s.shifted(offset), traj.d, traj.t)
}

fn wrap_s(s: f64, max_s: f64) -> f64 {
    if max_s > 0.0 {
        s.rem_euclid(max_s)
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CostWeights, TrajectoryConfig};
    use crate::trajectory::target_state::Goal;
    use crate::mapping::waypoint_map::WaypointMap;
    use crate::prediction::vehicle_tracker::SensorFusionReading;
    use approx::assert_abs_diff_eq;

    fn config() -> PlannerConfig {
        let mut config = PlannerConfig::default();
        config.trajectory.seed = Some(5);
        config.trajectory.trajectory_samples = 4;
        config
    }

    fn road() -> WaypointMap {
        WaypointMap::straight(1000.0, 30.0).unwrap()
    }

    fn at_rest(s: f64) -> Telemetry {
        Telemetry::new(s, -6.0, s, 6.0, 0.0, 0.0)
    }

    #[test]
    fn test_first_tick_plans_along_lane() {
        let now = Instant::now();
        let mut session = PlannerSession::new(config(), now);
        let path = session.tick(&at_rest(100.0), &road(), now);

        assert!(path.len() >= 290);
        for w in path.points.windows(2) {
            assert!(w[1].x > w[0].x);
        }
        for p in &path.points {
            assert!((p.y + 6.0).abs() < 1.0);
        }
        assert_eq!(session.plans(), 1);
        assert!(session.trajectory_planner().last_trajectory().is_some());
        assert!(!session.is_following());
    }

    #[test]
    fn test_replan_interval_reemits_previous_path() {
        let now = Instant::now();
        let mut session = PlannerSession::new(config(), now);
        let first = session.tick(&at_rest(100.0), &road(), now);

        let previous = Path2D::from_points(first.points[25..].to_vec());
        let telemetry = at_rest(100.0).with_previous_path(previous.clone(), 0.0, 6.0);
        let second = session.tick(&telemetry, &road(), now + Duration::from_millis(500));
        assert_eq!(second, previous);
        assert_eq!(session.plans(), 1);
    }

    #[test]
    fn test_retained_points_and_reference_velocity_carry_over() {
        let now = Instant::now();
        let mut session = PlannerSession::new(config(), now);
        let first = session.tick(&at_rest(100.0), &road(), now);

        // the simulator drove 50 points
        let previous = Path2D::from_points(first.points[50..].to_vec());
        let telemetry = Telemetry::new(first.points[49].x, -6.0, first.points[49].x, 6.0, 0.0, 11.0)
            .with_previous_path(previous.clone(), 0.0, 6.0);
        let second = session.tick(&telemetry, &road(), now + Duration::from_millis(1100));

        assert_eq!(&second.points[..10], &previous.points[..10]);
        assert!(second.points[10].x > second.points[9].x);
        // 45 steps of 0.224 mph then 15 of 0.2 mph
        assert_abs_diff_eq!(session.ego().reference_velocity, 45.0 * 0.224 + 15.0 * 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_vehicle_ahead_selects_slow_goal() {
        let now = Instant::now();
        let mut session = PlannerSession::new(config(), now);
        session.tick(&at_rest(100.0), &road(), now);
        assert_eq!(session.target().map(|t| t.s.velocity), Some(7.0));

        let blocker = SensorFusionReading { id: 9, x: 110.0, y: -6.0, vx: 0.0, vy: 0.0, s: 110.0, d: 6.0 };
        let telemetry = at_rest(100.0).with_sensor_fusion(vec![blocker]);
        session.tick(&telemetry, &road(), now + Duration::from_millis(1100));

        assert!(session.is_following());
        assert_eq!(session.target().map(|t| t.s.velocity), Some(5.5));
        assert_eq!(session.tracker().len(), 1);
    }

    /// Goals covering `scale` times the nominal distance at `scale` times
    /// the nominal velocity
    struct Scaled(f64);

    impl GoalSampler for Scaled {
        fn sample(&mut self, target: &TargetState, t: f64) -> Goal {
            let nominal = target.nominal_goal(t);
            let start = target.s.position;
            let s = KinematicState1D::new(
                start + self.0 * (nominal.s.position - start),
                self.0 * nominal.s.velocity,
                0.0,
            );
            Goal { s, d: nominal.d, t }
        }
    }

    fn acceleration_only() -> PlannerConfig {
        let mut config = config();
        config.cost.weights = CostWeights {
            collision: 0.0,
            total_acceleration: 1.0,
            max_acceleration: 0.0,
            efficiency: 0.0,
            total_jerk: 0.0,
            buffer: 0.0,
            s_diff: 0.0,
            d_diff: 0.0,
            max_jerk: 0.0,
            speed_limit: 0.0,
            stay_in_lane: 0.0,
        };
        config
    }

    #[test]
    fn test_emitted_speed_follows_winning_trajectory() {
        let now = Instant::now();
        let mut slow = PlannerSession::with_sampler(acceleration_only(), Scaled(0.5), now);
        let mut fast = PlannerSession::with_sampler(acceleration_only(), Scaled(1.0), now);
        let slow_path = slow.tick(&at_rest(100.0), &road(), now);
        let fast_path = fast.tick(&at_rest(100.0), &road(), now);

        let slow_winner = slow.trajectory_planner().last_trajectory().copied().unwrap();
        assert_abs_diff_eq!(average_velocity(&slow_winner), 3.5, epsilon = 1e-6);

        // half the cruise goal velocity maps to half the maximum reference velocity
        let slow_end = *slow.velocity_profile.last().unwrap();
        let fast_end = *fast.velocity_profile.last().unwrap();
        assert_abs_diff_eq!(slow_end, 49.1 / 2.0, epsilon = 1e-6);
        assert!(fast_end > slow_end + 10.0);
        assert!(fast_path.last().unwrap().x > slow_path.last().unwrap().x + 10.0);
    }

    #[test]
    fn test_failed_plan_falls_back_to_previous_path() {
        let mut config = config();
        config.trajectory = TrajectoryConfig { horizon: -1.0, lane_change_horizon: -1.0, ..config.trajectory };
        let now = Instant::now();
        let mut session = PlannerSession::new(config, now);

        let previous = Path2D::from_xy(&[100.0, 100.5, 101.0], &[-6.0, -6.0, -6.0]);
        let telemetry = at_rest(100.0).with_previous_path(previous.clone(), 101.0, 6.0);
        let path = session.tick(&telemetry, &road(), now);
        assert_eq!(path, previous);
        assert_eq!(session.failures(), 1);
        assert!(session.target().is_none());
    }

    #[test]
    fn test_lane_lock_until_settled() {
        let now = Instant::now();
        let mut session = PlannerSession::new(config(), now);
        let left = LaneDescriptor { id: 0, center_d: 2.0, cost: 0.0 };

        assert!(session.update_lane_lock(left, 6.0));
        assert!(session.update_lane_lock(left, 3.0));
        assert!(!session.update_lane_lock(left, 2.2));
        assert!(!session.update_lane_lock(left, 2.0));
    }

    #[test]
    fn test_rebase_and_wrap() {
        let traj = Trajectory::between(
            &[6940.0, 7.0, 0.0].into(),
            &[6.0, 0.0, 0.0].into(),
            &[6982.0, 7.0, 0.0].into(),
            &[6.0, 0.0, 0.0].into(),
            6.0,
        ).unwrap();
        let moved = rebase(&traj, 2.0, 6945.554);
        assert_abs_diff_eq!(moved.s.calc_point(0.0), 2.0 + 6945.554, epsilon = 1e-9);
        assert_abs_diff_eq!(wrap_s(6950.0, 6945.554), 6950.0 - 6945.554, epsilon = 1e-9);
        assert_eq!(wrap_s(-1.0, 0.0), -1.0);
    }
}
