//! Real-time dynamic programming over pruned action sets
//!
//! Each rollout walks greedily from the initial state, backing up every
//! visited state over the provider's action set for that state, until a
//! terminal state or `max_depth` steps. Planning stops after
//! `min_rollouts_with_small_change` consecutive rollouts whose largest value
//! change stayed below `max_delta`, or after `num_rollouts` rollouts.

use affordance_common::MdpState;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::mdp::Mdp;
use super::value_function::{ActionTransitions, ValueFunction};
use crate::config::RtdpSettings;
use crate::provider::ActionSetProvider;

/// Outcome of an RTDP run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RtdpReport {
    pub rollouts: usize,
    /// Total Bellman backups
    pub bellman_updates: usize,
    /// Steps summed over all rollouts
    pub total_steps: usize,
    /// Longest rollout
    pub max_rollout_steps: usize,
    /// Stopped on the small-change criterion rather than the rollout cap
    pub converged: bool,
}

pub struct Rtdp<S, P> {
    mdp: Mdp<S>,
    provider: P,
    settings: RtdpSettings,
    values: ValueFunction<S>,
    rng: StdRng,
}

impl<S, P> Rtdp<S, P>
where
    S: MdpState,
    P: ActionSetProvider<S>,
{
    pub fn new(mdp: Mdp<S>, provider: P, settings: RtdpSettings, seed: Option<u64>) -> Self {
        let seed = crate::resolve_seed(seed, "rtdp");
        Self {
            values: ValueFunction::new(settings.value_init),
            mdp,
            provider,
            settings,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[instrument(skip(self, initial))]
    pub fn plan_from_state(&mut self, initial: &S) -> RtdpReport {
        let mut report = RtdpReport::default();
        let mut consecutive_small = 0;

        while report.rollouts < self.settings.num_rollouts {
            let (steps, delta) = self.rollout(initial);
            report.rollouts += 1;
            report.total_steps += steps;
            report.bellman_updates += steps;
            report.max_rollout_steps = report.max_rollout_steps.max(steps);

            if delta < self.settings.max_delta {
                consecutive_small += 1;
                if consecutive_small >= self.settings.min_rollouts_with_small_change {
                    report.converged = true;
                    break;
                }
            } else {
                consecutive_small = 0;
            }
        }

        info!(
            rollouts = report.rollouts,
            bellman_updates = report.bellman_updates,
            total_steps = report.total_steps,
            converged = report.converged,
            "rtdp finished"
        );
        report
    }

    /// One greedy rollout. Returns the number of steps (one backup each) and
    /// the largest value change.
    fn rollout(&mut self, initial: &S) -> (usize, f64) {
        let mut state = initial.clone();
        let mut steps = 0;
        let mut delta: f64 = 0.0;

        while !self.mdp.is_terminal(&state) && steps < self.settings.max_depth {
            let actions = self.provider.actions_for_state(&state);
            let options = ActionTransitions::expand_all(&state, actions);

            let Some(choice) = self.values.greedy(&self.mdp, &state, &options, &mut self.rng) else {
                debug!(state = ?state, "no applicable action, ending rollout");
                break;
            };

            let old = self.values.get(&state);
            let new = self.values.backup(&self.mdp, &state, &options);
            delta = delta.max((new - old).abs());
            steps += 1;

            match options[choice].action.execute_in(&state, &mut self.rng) {
                Some(next) => state = next,
                None => break,
            }
        }

        (steps, delta)
    }

    pub fn value(&self, state: &S) -> f64 {
        self.values.value(&self.mdp, state)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Forget all values
    pub fn reset(&mut self) {
        self.values.clear();
    }
}
