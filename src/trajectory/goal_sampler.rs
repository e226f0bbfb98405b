//! Stochastic perturbation of the nominal goal

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::common::{GoalSampler, KinematicState1D};
use crate::trajectory::target_state::{Goal, TargetState};

/// Draws each goal component from a normal centered on the target projection
pub struct GaussianGoalSampler {
    rng: StdRng,
    sigma_s: [f64; 3],
    sigma_d: [f64; 3],
}

impl GaussianGoalSampler {
    pub fn new(sigma_s: [f64; 3], sigma_d: [f64; 3], seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        GaussianGoalSampler { rng, sigma_s, sigma_d }
    }

    fn wiggle(&mut self, state: &KinematicState1D, sigma: [f64; 3]) -> KinematicState1D {
        let mean = state.to_array();
        let mut out = [0.0; 3];
        for i in 0..3 {
            // A malformed sigma degrades to the unperturbed component
            out[i] = Normal::new(mean[i], sigma[i])
                .map(|n| n.sample(&mut self.rng))
                .unwrap_or(mean[i]);
        }
        out.into()
    }
}

impl GoalSampler for GaussianGoalSampler {
    fn sample(&mut self, target: &TargetState, t: f64) -> Goal {
        let nominal = target.nominal_goal(t);
        let (sigma_s, sigma_d) = (self.sigma_s, self.sigma_d);
        Goal {
            s: self.wiggle(&nominal.s, sigma_s),
            d: self.wiggle(&nominal.d, sigma_d),
            t,
        }
    }
}
