//! Action-set providers
//!
//! Planners ask a provider for the actions to consider in a state. The
//! identity provider returns the domain's full action set; the pruning
//! controller returns its posterior-filtered subset.

use affordance_common::{Domain, GroundedAction};
use affordance_core::AffordancePruningController;

pub trait ActionSetProvider<S> {
    /// Actions to consider in `state`. Never empty for a non-empty domain.
    fn actions_for_state(&mut self, state: &S) -> Vec<GroundedAction<S>>;

    /// Changes whenever previously returned action sets may be stale
    fn revision(&self) -> u64;
}

/// Identity provider: every action, in every state
#[derive(Debug, Clone)]
pub struct FullActionSet<S> {
    actions: Vec<GroundedAction<S>>,
}

impl<S> FullActionSet<S> {
    pub fn new(actions: Vec<GroundedAction<S>>) -> Self {
        Self { actions }
    }

    /// All of `domain`'s actions grounded with free variables
    pub fn from_domain(domain: &dyn Domain<S>) -> Self {
        Self::new(domain.grounded_actions())
    }

    pub fn actions(&self) -> &[GroundedAction<S>] {
        &self.actions
    }
}

impl<S> ActionSetProvider<S> for FullActionSet<S> {
    fn actions_for_state(&mut self, _state: &S) -> Vec<GroundedAction<S>> {
        self.actions.clone()
    }

    fn revision(&self) -> u64 {
        0
    }
}

impl<S> ActionSetProvider<S> for AffordancePruningController<S> {
    fn actions_for_state(&mut self, state: &S) -> Vec<GroundedAction<S>> {
        self.pruned_actions_for_state(state)
    }

    fn revision(&self) -> u64 {
        AffordancePruningController::revision(self)
    }
}
