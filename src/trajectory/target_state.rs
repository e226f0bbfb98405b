//! Target state the trajectory search aims for

use crate::common::KinematicState1D;

/// A candidate end state: longitudinal and lateral state reached at `t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Goal {
    pub s: KinematicState1D,
    pub d: KinematicState1D,
    pub t: f64,
}

/// Goal kinematics plus their projection at the last requested time
#[derive(Debug, Clone, PartialEq)]
pub struct TargetState {
    pub s: KinematicState1D,
    pub d: KinematicState1D,
    /// `[position, velocity, acceleration]` of `s` projected at `projected_at`
    pub s_targets: [f64; 3],
    /// `[position, velocity, acceleration]` of `d` projected at `projected_at`
    pub d_targets: [f64; 3],
    pub projected_at: f64,
}

impl TargetState {
    pub fn new(s: KinematicState1D, d: KinematicState1D) -> Self {
        TargetState {
            s,
            d,
            s_targets: s.to_array(),
            d_targets: d.to_array(),
            projected_at: 0.0,
        }
    }

    /// Re-project the targets at elapsed time `t`.
    ///
    /// Always starts from the base states, so repeated calls never accumulate.
    pub fn project(&mut self, t: f64) {
        let (s_targets, d_targets) = self.targets_at(t);
        self.s_targets = s_targets;
        self.d_targets = d_targets;
        self.projected_at = t;
    }

    /// Projected `(S_TARGETS, D_TARGETS)` at `t` without touching `self`
    pub fn targets_at(&self, t: f64) -> ([f64; 3], [f64; 3]) {
        (self.s.project(t).to_array(), self.d.project(t).to_array())
    }

    /// Unperturbed goal at `t`
    pub fn nominal_goal(&self, t: f64) -> Goal {
        Goal { s: self.s.project(t), d: self.d.project(t), t }
    }
}
