//! Reachability-based value iteration
//!
//! 1. Discover every state reachable from the initial state under the
//!    provider's action sets, caching each state's expanded transitions.
//! 2. Sweep the discovered states with Bellman backups over the cached
//!    transitions until the largest change in a pass drops below `max_delta`
//!    or the pass cap is reached.
//!
//! The backups reuse exactly the transitions that drove discovery, so the
//! discovered set is closed under them. A provider revision change (such as a
//! new goal) drops the cache and the discovered set.

use std::collections::{HashMap, HashSet, VecDeque};

use affordance_common::{GroundedAction, MdpState, PlannerError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::mdp::Mdp;
use super::value_function::{ActionTransitions, ValueFunction};
use crate::config::ValueIterationSettings;
use crate::provider::ActionSetProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    ReachabilityDiscovered,
    Iterating,
    Converged,
    IterationCapReached,
}

/// Outcome of a backup run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupReport {
    /// Full passes over the discovered states
    pub passes: usize,
    /// Bellman backups performed
    pub bellman_updates: usize,
    /// Largest change in the last pass
    pub final_delta: f64,
    pub converged: bool,
}

pub struct ValueIteration<S, P> {
    mdp: Mdp<S>,
    provider: P,
    settings: ValueIterationSettings,
    values: ValueFunction<S>,
    /// Cached expansions of discovered states
    transitions: HashMap<S, Vec<ActionTransitions<S>>>,
    /// Discovered states in discovery order
    order: Vec<S>,
    phase: Phase,
    /// Provider revision the cache was built against
    cache_revision: Option<u64>,
    rng: StdRng,
}

impl<S, P> ValueIteration<S, P>
where
    S: MdpState,
    P: ActionSetProvider<S>,
{
    pub fn new(mdp: Mdp<S>, provider: P, settings: ValueIterationSettings, seed: Option<u64>) -> Self {
        let seed = crate::resolve_seed(seed, "value_iteration");
        Self {
            mdp,
            provider,
            settings,
            values: ValueFunction::new(0.0),
            transitions: HashMap::new(),
            order: Vec::new(),
            phase: Phase::Uninitialized,
            cache_revision: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Drop cached expansions if the provider has changed since discovery
    fn sync_with_provider(&mut self) {
        let revision = self.provider.revision();
        if self.cache_revision.is_some_and(|r| r != revision) {
            debug!(
                old = ?self.cache_revision,
                new = revision,
                states = self.order.len(),
                "action sets changed, dropping reachability cache"
            );
            self.transitions.clear();
            self.order.clear();
            self.phase = Phase::Uninitialized;
            self.cache_revision = None;
        }
    }

    /// Breadth-first discovery from `initial`. Returns `false` when `initial`
    /// was already discovered and nothing needed expanding.
    #[instrument(skip(self, initial))]
    pub fn discover_reachable_states(&mut self, initial: &S) -> bool {
        self.sync_with_provider();
        if self.phase != Phase::Uninitialized && self.transitions.contains_key(initial) {
            return false;
        }

        let before = self.order.len();
        let mut open = VecDeque::from([initial.clone()]);
        let mut opened: HashSet<S> = HashSet::from([initial.clone()]);

        while let Some(state) = open.pop_front() {
            if self.transitions.contains_key(&state) {
                continue;
            }

            if self.settings.stop_reachability_from_terminal_states && self.mdp.is_terminal(&state) {
                self.transitions.insert(state.clone(), Vec::new());
                self.order.push(state);
                continue;
            }

            let actions = self.provider.actions_for_state(&state);
            let expanded = ActionTransitions::expand_all(&state, actions);
            for option in &expanded {
                for tp in &option.transitions {
                    if !self.transitions.contains_key(&tp.state) && opened.insert(tp.state.clone()) {
                        open.push_back(tp.state.clone());
                    }
                }
            }

            self.transitions.insert(state.clone(), expanded);
            self.order.push(state);
        }

        self.cache_revision = Some(self.provider.revision());
        self.phase = Phase::ReachabilityDiscovered;
        debug!(
            new_states = self.order.len() - before,
            states = self.order.len(),
            "finished reachability analysis"
        );
        true
    }

    /// Sweep the discovered states until convergence or the pass cap
    #[instrument(skip(self))]
    pub fn run_backups(&mut self) -> Result<BackupReport, PlannerError> {
        self.sync_with_provider();
        if self.phase == Phase::Uninitialized {
            return Err(PlannerError::ReachabilityNotPerformed);
        }

        self.phase = Phase::Iterating;
        let mut report = BackupReport::default();

        while report.passes < self.settings.max_iterations {
            let mut delta: f64 = 0.0;
            for state in &self.order {
                let old = self.values.get(state);
                let options = self.transitions.get(state).map(Vec::as_slice).unwrap_or(&[]);
                let new = self.values.backup(&self.mdp, state, options);
                report.bellman_updates += 1;
                delta = delta.max((new - old).abs());
            }
            report.passes += 1;
            report.final_delta = delta;

            if delta < self.settings.max_delta {
                report.converged = true;
                break;
            }
        }

        self.phase = if report.converged {
            Phase::Converged
        } else {
            Phase::IterationCapReached
        };
        info!(
            passes = report.passes,
            bellman_updates = report.bellman_updates,
            states = self.order.len(),
            converged = report.converged,
            "value iteration finished"
        );
        Ok(report)
    }

    /// Discover from `initial`, then run backups. Skips the backups when
    /// nothing new was discovered and the value function has already settled.
    pub fn plan_from_state(&mut self, initial: &S) -> Result<BackupReport, PlannerError> {
        let discovered = self.discover_reachable_states(initial);
        if !discovered && matches!(self.phase, Phase::Converged | Phase::IterationCapReached) {
            return Ok(BackupReport {
                converged: self.phase == Phase::Converged,
                ..BackupReport::default()
            });
        }
        self.run_backups()
    }

    /// Best cached action in a discovered state, ties broken at random
    pub fn greedy_action(&mut self, state: &S) -> Option<GroundedAction<S>> {
        let options = self.transitions.get(state)?;
        let i = self.values.greedy(&self.mdp, state, options, &mut self.rng)?;
        Some(options[i].action.clone())
    }

    pub fn value(&self, state: &S) -> f64 {
        self.values.value(&self.mdp, state)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Discovered states in discovery order
    pub fn discovered_states(&self) -> &[S] {
        &self.order
    }

    pub fn is_discovered(&self, state: &S) -> bool {
        self.transitions.contains_key(state)
    }

    /// Successors of a discovered state under its cached actions
    pub fn successors<'a>(&'a self, state: &S) -> impl Iterator<Item = &'a S> + 'a {
        self.transitions
            .get(state)
            .into_iter()
            .flatten()
            .flat_map(|option| option.transitions.iter().map(|tp| &tp.state))
    }

    /// Cached action set of a discovered state
    pub fn cached_actions(&self, state: &S) -> Option<Vec<&GroundedAction<S>>> {
        self.transitions
            .get(state)
            .map(|options| options.iter().map(|o| &o.action).collect())
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Mutable provider access, e.g. to change the goal. Revision changes are
    /// picked up on the next discovery or backup run.
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Forget discovered states and values
    pub fn reset(&mut self) {
        self.transitions.clear();
        self.order.clear();
        self.values.clear();
        self.cache_revision = None;
        self.phase = Phase::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gridworld::{GridState, GridWorld};
    use crate::provider::FullActionSet;
    use affordance_core::PruningConfig;

    fn full(world: &GridWorld) -> ValueIteration<GridState, FullActionSet<GridState>> {
        ValueIteration::new(
            world.mdp(0.95).unwrap(),
            FullActionSet::from_domain(&world.domain()),
            ValueIterationSettings::default(),
            Some(1),
        )
    }

    #[test]
    fn test_backups_require_discovery() {
        let world = GridWorld::new(3, 3, (2, 2));
        let mut vi = full(&world);
        assert_eq!(vi.run_backups(), Err(PlannerError::ReachabilityNotPerformed));
        assert_eq!(vi.phase(), Phase::Uninitialized);
    }

    #[test]
    fn test_discovery_is_idempotent() {
        let world = GridWorld::new(3, 3, (2, 2));
        let mut vi = full(&world);
        let start = GridState::new(0, 0);

        assert!(vi.discover_reachable_states(&start));
        assert_eq!(vi.discovered_states().len(), 9);
        assert_eq!(vi.phase(), Phase::ReachabilityDiscovered);

        assert!(!vi.discover_reachable_states(&start));
        assert!(!vi.discover_reachable_states(&GridState::new(1, 1)));
        assert_eq!(vi.discovered_states().len(), 9);
    }

    #[test]
    fn test_terminal_states_not_expanded() {
        let world = GridWorld::new(3, 1, (1, 0));
        let mut vi = full(&world);
        vi.discover_reachable_states(&GridState::new(0, 0));

        // (2, 0) is only reachable through the goal
        assert!(!vi.is_discovered(&GridState::new(2, 0)));
        assert_eq!(vi.successors(&GridState::new(1, 0)).count(), 0);

        let mut settings = ValueIterationSettings::default();
        settings.stop_reachability_from_terminal_states = false;
        let mut vi = ValueIteration::new(
            world.mdp(0.95).unwrap(),
            FullActionSet::from_domain(&world.domain()),
            settings,
            Some(1),
        );
        vi.discover_reachable_states(&GridState::new(0, 0));
        assert!(vi.is_discovered(&GridState::new(2, 0)));
    }

    #[test]
    fn test_converges_to_shortest_path_values() {
        let world = GridWorld::new(4, 4, (3, 3));
        let mut vi = full(&world);
        let report = vi.plan_from_state(&GridState::new(0, 0)).unwrap();

        assert!(report.converged);
        assert_eq!(vi.phase(), Phase::Converged);
        assert_eq!(vi.value(&GridState::new(3, 3)), 0.0);
        assert!((vi.value(&GridState::new(3, 2)) - -1.0).abs() < 1e-6);
        assert!((vi.value(&GridState::new(2, 2)) - (-1.0 - 0.95)).abs() < 1e-6);

        // Nothing new: no further backups
        let again = vi.plan_from_state(&GridState::new(0, 0)).unwrap();
        assert_eq!(again.bellman_updates, 0);
        assert!(again.converged);
    }

    #[test]
    fn test_iteration_cap() {
        let world = GridWorld::new(6, 6, (5, 5));
        let mut settings = ValueIterationSettings::default();
        settings.max_iterations = 2;
        let mut vi = ValueIteration::new(
            world.mdp(0.95).unwrap(),
            FullActionSet::from_domain(&world.domain()),
            settings,
            Some(1),
        );

        let report = vi.plan_from_state(&GridState::new(0, 0)).unwrap();
        assert_eq!(report.passes, 2);
        assert_eq!(report.bellman_updates, 2 * 36);
        assert!(!report.converged);
        assert_eq!(vi.phase(), Phase::IterationCapReached);
    }

    #[test]
    fn test_greedy_action_heads_to_goal() {
        let world = GridWorld::new(4, 1, (3, 0));
        let mut vi = full(&world);
        vi.plan_from_state(&GridState::new(0, 0)).unwrap();

        let action = vi.greedy_action(&GridState::new(1, 0)).unwrap();
        assert_eq!(action.name(), "east");
        assert!(vi.greedy_action(&GridState::new(9, 9)).is_none());
    }

    #[test]
    fn test_pruned_discovery_is_closed() {
        let world = GridWorld::new(6, 6, (5, 5));
        let domain = world.domain();
        let controller = world
            .demo_controller(&domain, PruningConfig::default().seeded(5))
            .unwrap();
        let mut vi = ValueIteration::new(
            world.mdp(0.95).unwrap(),
            controller,
            ValueIterationSettings::default(),
            Some(1),
        );
        let start = GridState::new(0, 0);
        vi.plan_from_state(&start).unwrap();

        for state in vi.discovered_states() {
            for next in vi.successors(state) {
                assert!(vi.is_discovered(next), "{next:?} reached from {state:?} but not discovered");
            }
        }
        // Only the moves towards the goal survive pruning
        for state in vi.discovered_states() {
            if let Some(actions) = vi.cached_actions(state) {
                assert!(actions.iter().all(|a| a.name() == "north" || a.name() == "east"));
            }
        }
        // Pruning keeps the shortest paths: ten steps from the goal
        let expected = -(1.0 - 0.95f64.powi(10)) / (1.0 - 0.95);
        assert!((vi.value(&start) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_goal_change_invalidates_cache() {
        let world = GridWorld::new(4, 4, (3, 3));
        let domain = world.domain();
        let controller = world
            .demo_controller(&domain, PruningConfig::default().seeded(5))
            .unwrap();
        let mut vi = ValueIteration::new(
            world.mdp(0.95).unwrap(),
            controller,
            ValueIterationSettings::default(),
            Some(1),
        );
        vi.plan_from_state(&GridState::new(0, 0)).unwrap();
        assert_eq!(vi.phase(), Phase::Converged);

        vi.provider_mut().set_current_goal(world.goal_expression(&domain));
        assert_eq!(vi.run_backups(), Err(PlannerError::ReachabilityNotPerformed));
        assert!(vi.discovered_states().is_empty());

        assert!(vi.discover_reachable_states(&GridState::new(0, 0)));
        assert!(vi.run_backups().unwrap().converged);
    }
}
