//! Affordance pruning controller
//!
//! Owns the registered delegates and the union of their action sets, and
//! turns per-state posteriors into a non-empty action subset for planners.

pub mod posterior;

use std::collections::HashSet;
use std::sync::Arc;

use affordance_common::{ActionKey, ControllerError, GroundedAction, LogicalExpression};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::delegate::{AffordanceDelegate, DelegateKey};
use crate::selection::SelectionPolicy;
use crate::telemetry::PruningStats;
use crate::PruningConfig;

use self::posterior::{Evidence, PriorSource};

pub struct AffordancePruningController<S> {
    /// Registration order
    delegates: Vec<AffordanceDelegate<S>>,
    /// Union of every registered record's actions; only ever grows
    actions: Vec<GroundedAction<S>>,
    action_index: HashSet<ActionKey>,
    hard_threshold: f64,
    config: PruningConfig,
    current_goal: Option<Arc<dyn LogicalExpression<S>>>,
    rng: StdRng,
    revision: u64,
    stats: PruningStats,
}

impl<S> AffordancePruningController<S> {
    /// Create a controller over `delegates`. At least one delegate is required.
    pub fn new(
        delegates: Vec<AffordanceDelegate<S>>,
        config: PruningConfig,
    ) -> Result<Self, ControllerError> {
        if delegates.is_empty() {
            return Err(ControllerError::NoDelegates);
        }

        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::random::<u64>();
                info!(seed, "no pruning seed configured, drew one from entropy");
                seed
            }
        };

        let mut controller = Self {
            delegates: Vec::with_capacity(delegates.len()),
            actions: Vec::new(),
            action_index: HashSet::new(),
            hard_threshold: 0.0,
            config,
            current_goal: None,
            rng: StdRng::seed_from_u64(seed),
            revision: 0,
            stats: PruningStats::default(),
        };

        for delegate in delegates {
            if !controller.register_delegate(delegate) {
                warn!("duplicate delegate dropped at construction");
            }
        }
        if controller.actions.is_empty() {
            return Err(ControllerError::EmptyActionSet);
        }

        info!(
            delegates = controller.delegates.len(),
            actions = controller.actions.len(),
            policy = %controller.config.policy,
            prior_source = %controller.config.prior_source,
            hard_threshold = controller.hard_threshold,
            "pruning controller ready"
        );
        Ok(controller)
    }

    /// Propagate `goal` to every delegate
    pub fn set_current_goal(&mut self, goal: Arc<dyn LogicalExpression<S>>) {
        for delegate in &mut self.delegates {
            delegate.set_current_goal(goal.as_ref());
        }
        let active = self.delegates.iter().filter(|d| d.is_goal_active()).count();
        debug!(goal = %goal.description(), goal_active = active, "current goal set");

        self.current_goal = Some(goal);
        self.revision += 1;
    }

    /// Register `delegate`. Returns `false` when a delegate with the same
    /// (precondition, goal) key is already registered.
    pub fn register_delegate(&mut self, mut delegate: AffordanceDelegate<S>) -> bool {
        let key = delegate.key();
        if self.delegates.iter().any(|d| d.key() == key) {
            return false;
        }

        if let Some(first) = self.delegates.first() {
            if !first.record().same_totals_as(delegate.record()) {
                warn!(
                    delegate = %key,
                    first = %first,
                    prior_source = %self.config.prior_source,
                    "delegate total-count table differs from the first delegate's"
                );
            }
        }

        for action in delegate.record().actions() {
            if self.action_index.insert(action.key().clone()) {
                self.actions.push(action.clone());
            }
        }
        self.hard_threshold = if self.actions.is_empty() {
            0.0
        } else {
            self.config.hard_threshold_numerator / self.actions.len() as f64
        };

        if let Some(goal) = &self.current_goal {
            delegate.set_current_goal(goal.as_ref());
        }

        self.delegates.push(delegate);
        self.revision += 1;
        true
    }

    /// Remove the delegate registered under `key`. The action union is kept.
    pub fn unregister_delegate(&mut self, key: &DelegateKey) -> Option<AffordanceDelegate<S>> {
        let position = self.delegates.iter().position(|d| &d.key() == key)?;
        self.revision += 1;
        Some(self.delegates.remove(position))
    }

    /// Posterior for every action in the union, in union order
    pub fn posteriors_for_state(&self, state: &S) -> Vec<(ActionKey, Option<f64>)> {
        let evidence = Evidence::observe(&self.delegates, state, self.config.prior_source);
        self.actions
            .iter()
            .map(|a| (a.key().clone(), evidence.posterior(a.key())))
            .collect()
    }

    /// Actions worth considering in `state`. Never empty.
    pub fn pruned_actions_for_state(&mut self, state: &S) -> Vec<GroundedAction<S>> {
        let candidates = self.actions.len();
        if self.delegates.is_empty() {
            self.stats.record_query(candidates, candidates, true, 0);
            return self.actions.clone();
        }

        let evidence = Evidence::observe(&self.delegates, state, self.config.prior_source);
        let policy = self.config.policy;
        let mut undefined = 0;
        let mut kept = Vec::new();

        for action in &self.actions {
            match evidence.posterior(action.key()) {
                Some(p) if policy.keeps(p, self.hard_threshold, &mut self.rng) => {
                    kept.push(action.clone())
                }
                Some(_) => {}
                None => undefined += 1,
            }
        }

        let fallback = kept.is_empty();
        if fallback {
            debug!(policy = %policy, "empty selection, using full action set");
            kept = self.actions.clone();
        }
        self.stats
            .record_query(candidates, kept.len(), fallback, undefined);
        debug!(candidates, kept = kept.len(), undefined, "pruned actions");
        kept
    }

    pub fn hard_threshold(&self) -> f64 {
        self.hard_threshold
    }

    /// Union of all registered action sets
    pub fn actions(&self) -> &[GroundedAction<S>] {
        &self.actions
    }

    pub fn delegates(&self) -> &[AffordanceDelegate<S>] {
        &self.delegates
    }

    /// Mutable delegate access for training loops. Bumps the revision.
    pub fn delegates_mut(&mut self) -> &mut [AffordanceDelegate<S>] {
        self.revision += 1;
        &mut self.delegates
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.config.policy
    }

    pub fn prior_source(&self) -> PriorSource {
        self.config.prior_source
    }

    /// Changes whenever the pruned sets may change
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn stats(&self) -> &PruningStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    pub fn current_goal(&self) -> Option<&Arc<dyn LogicalExpression<S>>> {
        self.current_goal.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{atom, delegate};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn controller(
        delegates: Vec<AffordanceDelegate<i32>>,
        policy: SelectionPolicy,
    ) -> AffordancePruningController<i32> {
        let mut controller =
            AffordancePruningController::new(delegates, PruningConfig::with_policy(policy).seeded(7))
                .unwrap();
        controller.set_current_goal(atom("at_goal"));
        controller
    }

    fn names(actions: &[GroundedAction<i32>]) -> Vec<String> {
        actions.iter().map(|a| a.key().to_string()).collect()
    }

    #[test]
    fn test_two_action_threshold_scenario() {
        let d = delegate("positive", "at_goal", &[("inc", 9, 10), ("dec", 1, 10)]);
        // 0.2 / 2 actions = 0.1
        let config = PruningConfig::with_policy(SelectionPolicy::Threshold).seeded(1);
        let mut c = AffordancePruningController::new(vec![d], config).unwrap();
        c.set_current_goal(atom("at_goal"));

        assert!((c.hard_threshold() - 0.1).abs() < 1e-12);
        assert_eq!(names(&c.pruned_actions_for_state(&1)), vec!["inc"]);
    }

    #[test]
    fn test_no_delegates_rejected() {
        let result = AffordancePruningController::<i32>::new(Vec::new(), PruningConfig::default());
        assert_eq!(result.err(), Some(ControllerError::NoDelegates));
    }

    #[test]
    fn test_degrades_to_full_set_after_unregistering_all() {
        let d = delegate("positive", "at_goal", &[("inc", 9, 10), ("dec", 1, 10)]);
        let mut c = controller(vec![d], SelectionPolicy::Threshold);

        let removed = c.unregister_delegate(&DelegateKey {
            precondition: "positive".into(),
            goal: "at_goal".into(),
        });
        assert!(removed.is_some());
        assert!(c.delegates().is_empty());
        assert_eq!(names(&c.pruned_actions_for_state(&1)), vec!["inc", "dec"]);
        assert_eq!(c.stats().fallbacks, 1);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut c = controller(
            vec![delegate("positive", "at_goal", &[("inc", 9, 10), ("dec", 1, 10)])],
            SelectionPolicy::Threshold,
        );
        let revision = c.revision();

        assert!(!c.register_delegate(delegate("positive", "at_goal", &[("inc", 1, 10)])));
        assert_eq!(c.delegates().len(), 1);
        assert_eq!(c.revision(), revision);

        assert!(c.register_delegate(delegate("even", "at_goal", &[("inc", 5, 10), ("jump", 0, 10)])));
        assert_eq!(c.delegates().len(), 2);
        assert_eq!(names(c.actions()), vec!["inc", "dec", "jump(?a)"]);
        assert!((c.hard_threshold() - 0.2 / 3.0).abs() < 1e-12);
        // Newly registered delegates see the current goal
        assert!(c.delegates()[1].is_goal_active());
        assert!(c.revision() > revision);
    }

    #[test]
    fn test_union_survives_unregister() {
        let mut c = controller(
            vec![
                delegate("positive", "at_goal", &[("inc", 9, 10)]),
                delegate("even", "at_goal", &[("dec", 5, 10)]),
            ],
            SelectionPolicy::ExpertUnion,
        );
        let key = c.delegates()[1].key();
        c.unregister_delegate(&key);

        assert_eq!(names(c.actions()), vec!["inc", "dec"]);
        assert!(c.unregister_delegate(&key).is_none());
    }

    #[test]
    fn test_goal_mismatch_never_empty() {
        let mut c = controller(
            vec![delegate("positive", "at_goal", &[("inc", 9, 10), ("dec", 1, 10)])],
            SelectionPolicy::Threshold,
        );
        c.set_current_goal(atom("even"));
        // Every delegate inactive: evidence is complemented, never empty
        assert!(!c.pruned_actions_for_state(&1).is_empty());
        assert_eq!(c.current_goal().map(|g| g.description()), Some("even".to_string()));
    }

    #[test]
    fn test_expert_union_superset_of_threshold() {
        let delegates = || {
            vec![
                delegate("positive", "at_goal", &[("inc", 9, 10), ("dec", 1, 10), ("stay", 0, 5)]),
                delegate("even", "at_goal", &[("inc", 2, 10), ("dec", 6, 10), ("stay", 1, 5)]),
            ]
        };
        let mut threshold = controller(delegates(), SelectionPolicy::Threshold);
        let mut expert = controller(delegates(), SelectionPolicy::ExpertUnion);

        for state in -4..8 {
            let fallbacks = threshold.stats().fallbacks;
            let t: HashSet<_> = names(&threshold.pruned_actions_for_state(&state)).into_iter().collect();
            let e: HashSet<_> = names(&expert.pruned_actions_for_state(&state)).into_iter().collect();
            if threshold.stats().fallbacks == fallbacks {
                assert!(t.is_subset(&e), "state {state}: {t:?} not within {e:?}");
            }
        }
    }

    #[test]
    fn test_threshold_monotonicity() {
        let build = |numerator: f64| {
            let mut config = PruningConfig::with_policy(SelectionPolicy::Threshold).seeded(3);
            config.hard_threshold_numerator = numerator;
            let mut c = AffordancePruningController::new(
                vec![delegate(
                    "positive",
                    "at_goal",
                    &[("inc", 9, 10), ("dec", 3, 10), ("stay", 1, 10)],
                )],
                config,
            )
            .unwrap();
            c.set_current_goal(atom("at_goal"));
            c
        };

        let mut previous: Option<HashSet<String>> = None;
        for numerator in [0.0, 0.3, 0.6, 0.9, 1.2] {
            let mut c = build(numerator);
            let kept: HashSet<_> = names(&c.pruned_actions_for_state(&1)).into_iter().collect();
            if c.stats().fallbacks == 0 {
                if let Some(prev) = &previous {
                    assert!(kept.is_subset(prev), "{numerator}: {kept:?} vs {prev:?}");
                }
                previous = Some(kept);
            }
        }
    }

    #[test]
    fn test_zero_counts_never_yield_nan() {
        let mut c = controller(
            vec![delegate("positive", "at_goal", &[("inc", 0, 0), ("dec", 0, 0)])],
            SelectionPolicy::ExpertUnion,
        );

        for (_, posterior) in c.posteriors_for_state(&1) {
            assert_eq!(posterior, None);
        }
        assert_eq!(names(&c.pruned_actions_for_state(&1)), vec!["inc", "dec"]);
        assert_eq!(c.stats().undefined_posteriors, 2);
        assert_eq!(c.stats().fallbacks, 1);
    }

    #[test]
    fn test_prior_source_changes_posteriors() {
        let delegates = || {
            vec![
                delegate("positive", "at_goal", &[("inc", 5, 10), ("dec", 5, 10)]),
                delegate("even", "at_goal", &[("inc", 30, 30), ("dec", 0, 10)]),
            ]
        };
        let mut pooled = PruningConfig::default().seeded(1);
        pooled.prior_source = PriorSource::Pooled;
        let mut first = pooled.clone();
        first.prior_source = PriorSource::FirstDelegate;

        let mut a = AffordancePruningController::new(delegates(), pooled).unwrap();
        let mut b = AffordancePruningController::new(delegates(), first).unwrap();
        a.set_current_goal(atom("at_goal"));
        b.set_current_goal(atom("at_goal"));

        assert_eq!(b.prior_source(), PriorSource::FirstDelegate);
        assert_ne!(a.posteriors_for_state(&2), b.posteriors_for_state(&2));
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let delegates = || vec![delegate("positive", "at_goal", &[("inc", 6, 10), ("dec", 4, 10)])];
        let mut a = controller(delegates(), SelectionPolicy::Sample);
        let mut b = controller(delegates(), SelectionPolicy::Sample);

        for state in 0..50 {
            assert_eq!(
                names(&a.pruned_actions_for_state(&state)),
                names(&b.pruned_actions_for_state(&state))
            );
        }
    }

    #[test]
    fn test_goal_change_bumps_revision() {
        let mut c = controller(
            vec![delegate("positive", "at_goal", &[("inc", 9, 10)])],
            SelectionPolicy::Threshold,
        );
        let before = c.revision();
        c.set_current_goal(atom("at_goal"));
        assert_eq!(c.revision(), before + 1);
        let _ = c.delegates_mut();
        assert_eq!(c.revision(), before + 2);
    }

    #[test]
    fn test_stats_track_queries() {
        let mut c = controller(
            vec![delegate("positive", "at_goal", &[("inc", 9, 10), ("dec", 1, 10)])],
            SelectionPolicy::Threshold,
        );
        c.pruned_actions_for_state(&1);
        c.pruned_actions_for_state(&2);

        assert_eq!(c.stats().queries, 2);
        assert_eq!(c.stats().candidate_actions, 4);
        assert_eq!(c.stats().returned_actions, 2);
        c.reset_stats();
        assert_eq!(c.stats().queries, 0);
    }

    fn policy_strategy() -> impl Strategy<Value = SelectionPolicy> {
        prop_oneof![
            Just(SelectionPolicy::Threshold),
            Just(SelectionPolicy::ExpertUnion),
            Just(SelectionPolicy::Sample),
        ]
    }

    proptest! {
        #[test]
        fn prop_pruned_set_never_empty(
            counts in prop::collection::vec((0u64..20, 0u64..20), 4),
            policy in policy_strategy(),
            seed in any::<u64>(),
            state in -10i32..10,
        ) {
            let names = ["inc", "dec", "stay", "jump"];
            let entries: Vec<(&str, u64, u64)> = names
                .iter()
                .zip(&counts)
                .map(|(n, (a, extra))| (*n, *a, a + extra))
                .collect();

            let mut c = AffordancePruningController::new(
                vec![
                    delegate("positive", "at_goal", &entries),
                    delegate("even", "at_goal", &entries[..2]),
                ],
                PruningConfig::with_policy(policy).seeded(seed),
            )
            .unwrap();
            c.set_current_goal(atom("at_goal"));

            let pruned = c.pruned_actions_for_state(&state);
            prop_assert!(!pruned.is_empty());
            for (_, posterior) in c.posteriors_for_state(&state) {
                if let Some(p) = posterior {
                    prop_assert!(p.is_finite());
                    prop_assert!((0.0..=1.0).contains(&p));
                }
            }
        }

        #[test]
        fn prop_threshold_keeps_only_posteriors_above_cutoff(
            counts in prop::collection::vec((0u64..20, 0u64..20), 4),
            state in -10i32..10,
        ) {
            let names = ["inc", "dec", "stay", "jump"];
            let entries: Vec<(&str, u64, u64)> = names
                .iter()
                .zip(&counts)
                .map(|(n, (a, extra))| (*n, *a, a + extra))
                .collect();

            let mut c = controller(
                vec![
                    delegate("positive", "at_goal", &entries),
                    delegate("even", "at_goal", &entries[1..]),
                ],
                SelectionPolicy::Threshold,
            );
            let posteriors: HashMap<ActionKey, Option<f64>> =
                c.posteriors_for_state(&state).into_iter().collect();
            let threshold = c.hard_threshold();

            let pruned = c.pruned_actions_for_state(&state);
            if c.stats().fallbacks == 0 {
                for action in &pruned {
                    let p = posteriors[action.key()];
                    prop_assert!(
                        matches!(p, Some(p) if p > threshold),
                        "{} kept with posterior {:?} at cutoff {}", action.key(), p, threshold
                    );
                }
                for (key, p) in &posteriors {
                    if matches!(p, Some(p) if *p > threshold) {
                        prop_assert!(pruned.iter().any(|a| a.key() == key));
                    }
                }
            } else {
                prop_assert_eq!(pruned.len(), c.actions().len());
                prop_assert!(posteriors
                    .values()
                    .all(|p| !matches!(p, Some(p) if *p > threshold)));
            }
        }
    }
}
