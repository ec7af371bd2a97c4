//! Bounded RTDP over pruned action sets
//!
//! Keeps a lower and an upper bound on the value function. Rollouts act
//! greedily on the upper bound and sample successors in proportion to
//! `P(s' | s, a) · (upper(s') - lower(s'))`, so effort goes where the bounds
//! disagree most. A rollout ends at a terminal state, at `max_depth` steps, or
//! once the expected successor gap drops below `max_diff`; the visited states
//! are then backed up in reverse on both bounds. Planning stops when the
//! margin at the initial state is below `max_diff` or after `max_rollouts`.

use affordance_common::MdpState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::mdp::Mdp;
use super::value_function::{ActionTransitions, ValueFunction};
use crate::config::BoundedRtdpSettings;
use crate::provider::ActionSetProvider;

/// Outcome of a bounded RTDP run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundedRtdpReport {
    pub rollouts: usize,
    /// Bellman backups, counted once per bound
    pub bellman_updates: usize,
    pub total_steps: usize,
    pub max_rollout_steps: usize,
    /// `upper - lower` at the initial state when planning stopped
    pub final_margin: f64,
    /// Stopped because the margin closed rather than on the rollout cap
    pub converged: bool,
}

pub struct BoundedRtdp<S, P> {
    mdp: Mdp<S>,
    provider: P,
    settings: BoundedRtdpSettings,
    lower: ValueFunction<S>,
    upper: ValueFunction<S>,
    rng: StdRng,
}

impl<S, P> BoundedRtdp<S, P>
where
    S: MdpState,
    P: ActionSetProvider<S>,
{
    pub fn new(mdp: Mdp<S>, provider: P, settings: BoundedRtdpSettings, seed: Option<u64>) -> Self {
        let seed = crate::resolve_seed(seed, "bounded_rtdp");
        Self {
            lower: ValueFunction::new(settings.lower_value_init),
            upper: ValueFunction::new(settings.upper_value_init),
            mdp,
            provider,
            settings,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[instrument(skip(self, initial))]
    pub fn plan_from_state(&mut self, initial: &S) -> BoundedRtdpReport {
        let mut report = BoundedRtdpReport::default();

        loop {
            report.final_margin = self.margin(initial);
            if report.final_margin < self.settings.max_diff {
                report.converged = true;
                break;
            }
            if report.rollouts >= self.settings.max_rollouts {
                break;
            }

            let (steps, updates) = self.rollout(initial);
            report.rollouts += 1;
            report.total_steps += steps;
            report.bellman_updates += updates;
            report.max_rollout_steps = report.max_rollout_steps.max(steps);
        }

        info!(
            rollouts = report.rollouts,
            bellman_updates = report.bellman_updates,
            margin = report.final_margin,
            converged = report.converged,
            "bounded rtdp finished"
        );
        report
    }

    /// One rollout. Returns the steps taken and the backups performed.
    fn rollout(&mut self, initial: &S) -> (usize, usize) {
        let mut trajectory: Vec<(S, Vec<ActionTransitions<S>>)> = Vec::new();
        let mut state = initial.clone();
        let mut updates = 0;

        while !self.mdp.is_terminal(&state) && trajectory.len() < self.settings.max_depth {
            let actions = self.provider.actions_for_state(&state);
            let options = ActionTransitions::expand_all(&state, actions);

            self.lower.backup(&self.mdp, &state, &options);
            self.upper.backup(&self.mdp, &state, &options);
            updates += 2;

            let Some(choice) = self.upper.greedy(&self.mdp, &state, &options, &mut self.rng) else {
                debug!(state = ?state, "no applicable action, ending rollout");
                break;
            };
            let next = self.select_successor(&options[choice]);
            trajectory.push((state, options));

            match next {
                Some(next) => state = next,
                None => break,
            }
        }

        let steps = trajectory.len();
        for (state, options) in trajectory.iter().rev() {
            self.lower.backup(&self.mdp, state, options);
            self.upper.backup(&self.mdp, state, options);
            updates += 2;
        }
        (steps, updates)
    }

    /// Successor sampled by its share of the expected gap. `None` once that
    /// gap is below `max_diff`.
    fn select_successor(&mut self, option: &ActionTransitions<S>) -> Option<S> {
        let weights: Vec<f64> = option
            .transitions
            .iter()
            .map(|tp| tp.probability * self.margin(&tp.state).max(0.0))
            .collect();
        let total: f64 = weights.iter().sum();
        if !(total >= self.settings.max_diff) {
            return None;
        }

        let draw = self.rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut selected = None;
        for (tp, weight) in option.transitions.iter().zip(&weights) {
            if *weight <= 0.0 {
                continue;
            }
            selected = Some(&tp.state);
            cumulative += weight;
            if draw < cumulative {
                break;
            }
        }
        selected.cloned()
    }

    fn margin(&self, state: &S) -> f64 {
        self.upper.value(&self.mdp, state) - self.lower.value(&self.mdp, state)
    }

    /// Lower bound, the value reported for planning
    pub fn value(&self, state: &S) -> f64 {
        self.lower_value(state)
    }

    pub fn lower_value(&self, state: &S) -> f64 {
        self.lower.value(&self.mdp, state)
    }

    pub fn upper_value(&self, state: &S) -> f64 {
        self.upper.value(&self.mdp, state)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Forget both bounds
    pub fn reset(&mut self) {
        self.lower.clear();
        self.upper.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::{GridState, GridWorld};
    use crate::provider::FullActionSet;
    use affordance_core::PruningConfig;
    use proptest::prelude::*;

    fn settings(lower: f64) -> BoundedRtdpSettings {
        BoundedRtdpSettings {
            lower_value_init: lower,
            ..BoundedRtdpSettings::default()
        }
    }

    #[test]
    fn test_bounds_close_on_deterministic_grid() {
        let world = GridWorld::new(5, 5, (4, 4));
        let start = GridState::new(0, 0);
        let mut brtdp = BoundedRtdp::new(
            world.mdp(0.95).unwrap(),
            FullActionSet::from_domain(&world.domain()),
            settings(-20.0),
            Some(5),
        );
        let report = brtdp.plan_from_state(&start);

        assert!(report.converged);
        assert!(report.final_margin < BoundedRtdpSettings::default().max_diff);
        assert!(report.max_rollout_steps <= BoundedRtdpSettings::default().max_depth);
        let expected = -(1.0 - 0.95f64.powi(8)) / (1.0 - 0.95);
        assert!((brtdp.value(&start) - expected).abs() < 1e-2);
        assert!(brtdp.lower_value(&start) <= brtdp.upper_value(&start));
    }

    #[test]
    fn test_pruned_bounds_reach_same_value() {
        let world = GridWorld::new(6, 6, (5, 5));
        let domain = world.domain();
        let start = GridState::new(0, 0);

        let mut full = BoundedRtdp::new(
            world.mdp(0.95).unwrap(),
            FullActionSet::from_domain(&domain),
            settings(-20.0),
            Some(5),
        );
        let controller = world
            .demo_controller(&domain, PruningConfig::default().seeded(5))
            .unwrap();
        let mut pruned = BoundedRtdp::new(world.mdp(0.95).unwrap(), controller, settings(-20.0), Some(5));

        assert!(full.plan_from_state(&start).converged);
        assert!(pruned.plan_from_state(&start).converged);
        assert!((full.value(&start) - pruned.value(&start)).abs() < 1e-2);
        assert!(pruned.provider().stats().mean_kept_fraction() < 1.0);
    }

    #[test]
    fn test_terminal_start_is_already_converged() {
        let world = GridWorld::new(2, 2, (1, 1));
        let mut brtdp = BoundedRtdp::new(
            world.mdp(0.95).unwrap(),
            FullActionSet::from_domain(&world.domain()),
            BoundedRtdpSettings::default(),
            Some(3),
        );
        let report = brtdp.plan_from_state(&GridState::new(1, 1));
        assert_eq!(report.rollouts, 0);
        assert_eq!(report.final_margin, 0.0);
        assert!(report.converged);
    }

    #[test]
    fn test_rollout_cap_stops_planning() {
        let world = GridWorld::new(8, 8, (7, 7)).with_slip(0.3);
        let mut brtdp = BoundedRtdp::new(
            world.mdp(0.95).unwrap(),
            FullActionSet::from_domain(&world.domain()),
            BoundedRtdpSettings {
                max_rollouts: 2,
                ..BoundedRtdpSettings::default()
            },
            Some(3),
        );
        let report = brtdp.plan_from_state(&GridState::new(0, 0));
        assert_eq!(report.rollouts, 2);
        assert!(!report.converged);
        assert!(report.final_margin >= BoundedRtdpSettings::default().max_diff);

        brtdp.reset();
        assert_eq!(brtdp.upper_value(&GridState::new(0, 0)), 0.0);
        assert_eq!(brtdp.lower_value(&GridState::new(0, 0)), -100.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_lower_never_exceeds_upper(
            slip in 0.0f64..0.5,
            seed in any::<u64>(),
            x in 0i32..5,
            y in 0i32..5,
        ) {
            let world = GridWorld::new(5, 5, (4, 4)).with_slip(slip);
            let mut brtdp = BoundedRtdp::new(
                world.mdp(0.95).unwrap(),
                FullActionSet::from_domain(&world.domain()),
                BoundedRtdpSettings { max_rollouts: 20, max_depth: 30, ..settings(-20.0) },
                Some(seed),
            );
            let start = GridState::new(x, y);
            let report = brtdp.plan_from_state(&start);

            prop_assert!(report.max_rollout_steps <= 30);
            for cx in 0..5 {
                for cy in 0..5 {
                    let cell = GridState::new(cx, cy);
                    prop_assert!(brtdp.lower_value(&cell) <= brtdp.upper_value(&cell) + 1e-9);
                }
            }
        }
    }
}
