//! Sampling-based trajectory search
//!
//! Builds a population of goals around the target's projection, connects
//! each to the start state with a pair of jerk-minimal quintics and keeps
//! the cheapest one.

use std::collections::VecDeque;

use itertools::iproduct;
use log::debug;
use ordered_float::NotNan;
use rayon::prelude::*;

use crate::common::{GoalSampler, KinematicState1D, PlannerError, PlannerResult};
use crate::config::TrajectoryConfig;
use crate::trajectory::cost_functions::CostEvaluator;
use crate::trajectory::goal_sampler::GaussianGoalSampler;
use crate::trajectory::quintic_polynomials::Trajectory;
use crate::trajectory::target_state::{Goal, TargetState};

pub struct TrajectoryPlanner<G: GoalSampler = GaussianGoalSampler> {
    config: TrajectoryConfig,
    sampler: G,
    last_trajectory: Option<Trajectory>,
    history: VecDeque<Trajectory>,
}

impl TrajectoryPlanner<GaussianGoalSampler> {
    pub fn new(config: TrajectoryConfig) -> Self {
        let sampler = GaussianGoalSampler::new(config.sigma_s, config.sigma_d, config.seed);
        Self::with_sampler(config, sampler)
    }
}

impl<G: GoalSampler> TrajectoryPlanner<G> {
    pub fn with_sampler(config: TrajectoryConfig, sampler: G) -> Self {
        TrajectoryPlanner {
            history: VecDeque::with_capacity(config.history_len),
            config,
            sampler,
            last_trajectory: None,
        }
    }

    /// Winner of the previous `generate` call
    pub fn last_trajectory(&self) -> Option<&Trajectory> {
        self.last_trajectory.as_ref()
    }

    /// Recent winners, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Trajectory> {
        self.history.iter()
    }

    /// Nominal goal at `horizon` followed by the perturbed goals of every
    /// time step in `[horizon - timestep, horizon + timestep]`.
    pub fn goal_population(&mut self, target: &TargetState, horizon: f64) -> Vec<Goal> {
        let step = self.config.timestep;
        let mut goals = Vec::with_capacity(1 + 3 * self.config.trajectory_samples);
        goals.push(target.nominal_goal(horizon));

        for (k, _) in iproduct!(-1..=1, 0..self.config.trajectory_samples) {
            let t = horizon + k as f64 * step;
            if t > 0.0 {
                goals.push(self.sampler.sample(target, t));
            }
        }
        goals
    }

    /// Pick the cheapest trajectory from `start` towards the evaluator's target.
    pub fn generate(
        &mut self,
        start_s: &KinematicState1D,
        start_d: &KinematicState1D,
        horizon: f64,
        evaluator: &CostEvaluator,
    ) -> PlannerResult<Trajectory> {
        let goals = self.goal_population(evaluator.target(), horizon);

        let candidates: Vec<Trajectory> = goals.iter()
            .filter_map(|g| match Trajectory::between(start_s, start_d, &g.s, &g.d, g.t) {
                Ok(traj) => Some(traj),
                Err(e) => {
                    debug!("Dropping goal at t={:.2}: {}", g.t, e);
                    None
                }
            })
            .collect();

        let score = |(i, traj): (usize, &Trajectory)| {
            let cost = evaluator.calculate_cost(traj);
            if cost.is_finite() {
                NotNan::new(cost).ok().map(|c| (c, i))
            } else {
                None
            }
        };

        // (cost, index) ordering keeps the first candidate on ties
        let best = if self.config.parallel_scoring {
            candidates.par_iter().enumerate().filter_map(score).min()
        } else {
            candidates.iter().enumerate().filter_map(score).min()
        };

        let (cost, index) = best.ok_or(PlannerError::NoFeasibleTrajectory)?;
        let winner = candidates[index];
        debug!(
            "Selected candidate {} of {} with cost {:.4} (T={:.2})",
            index,
            candidates.len(),
            cost.into_inner(),
            winner.t
        );

        self.record(winner);
        Ok(winner)
    }

    fn record(&mut self, trajectory: Trajectory) {
        self.last_trajectory = Some(trajectory);
        if self.config.history_len == 0 {
            return;
        }
        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(trajectory);
    }
}
