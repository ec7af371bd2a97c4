//! Value function and Bellman backup
//!
//! ```text
//! Q(s, a) = Σ_s' P(s' | s, a) · (R(s, a, s') + γ · V(s'))
//! V(s)   ← max_a Q(s, a)
//! ```
//!
//! Terminal states are worth 0. A backup only considers the actions it is
//! handed, which is where pruning enters.

use std::collections::HashMap;

use affordance_common::{GroundedAction, MdpState, TransitionProbability};
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom;
use rand::Rng;

use super::mdp::Mdp;

/// An action together with its outcome distribution in one state
#[derive(Debug, Clone)]
pub struct ActionTransitions<S> {
    pub action: GroundedAction<S>,
    pub transitions: Vec<TransitionProbability<S>>,
}

impl<S> ActionTransitions<S> {
    /// Expand `action` in `state`
    pub fn expand(state: &S, action: GroundedAction<S>) -> Self {
        let transitions = action.transitions(state);
        Self {
            action,
            transitions,
        }
    }

    /// Expand every action, dropping those not applicable in `state`
    pub fn expand_all(state: &S, actions: Vec<GroundedAction<S>>) -> Vec<Self> {
        actions
            .into_iter()
            .map(|a| Self::expand(state, a))
            .filter(|at| !at.transitions.is_empty())
            .collect()
    }
}

/// Tabular state values with a default for unseen states
#[derive(Debug, Clone)]
pub struct ValueFunction<S> {
    values: HashMap<S, f64>,
    default_value: f64,
}

impl<S: MdpState> ValueFunction<S> {
    pub fn new(default_value: f64) -> Self {
        Self {
            values: HashMap::new(),
            default_value,
        }
    }

    /// Stored value of `state`, or the default
    pub fn get(&self, state: &S) -> f64 {
        self.values.get(state).copied().unwrap_or(self.default_value)
    }

    /// Value of `state` under `mdp`: 0 for terminal states
    pub fn value(&self, mdp: &Mdp<S>, state: &S) -> f64 {
        if mdp.is_terminal(state) {
            return 0.0;
        }
        self.get(state)
    }

    pub fn set(&mut self, state: S, value: f64) {
        self.values.insert(state, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn q_value(&self, mdp: &Mdp<S>, state: &S, option: &ActionTransitions<S>) -> f64 {
        option
            .transitions
            .iter()
            .map(|tp| {
                let reward = mdp.reward(state, option.action.key(), &tp.state);
                tp.probability * (reward + mdp.gamma() * self.value(mdp, &tp.state))
            })
            .sum()
    }

    /// Back up `state` over `options`. Returns the new value.
    ///
    /// Terminal states are set to 0. With no applicable option the value is
    /// left unchanged.
    pub fn backup(&mut self, mdp: &Mdp<S>, state: &S, options: &[ActionTransitions<S>]) -> f64 {
        if mdp.is_terminal(state) {
            self.set(state.clone(), 0.0);
            return 0.0;
        }

        let best = options
            .iter()
            .map(|o| OrderedFloat(self.q_value(mdp, state, o)))
            .max();

        match best {
            Some(OrderedFloat(v)) => {
                self.set(state.clone(), v);
                v
            }
            None => self.get(state),
        }
    }

    /// Index of a Q-maximising option, ties broken uniformly with `rng`
    pub fn greedy<R: Rng>(
        &self,
        mdp: &Mdp<S>,
        state: &S,
        options: &[ActionTransitions<S>],
        rng: &mut R,
    ) -> Option<usize> {
        let qs: Vec<OrderedFloat<f64>> = options
            .iter()
            .map(|o| OrderedFloat(self.q_value(mdp, state, o)))
            .collect();
        let best = *qs.iter().max()?;

        let ties: Vec<usize> = qs
            .iter()
            .enumerate()
            .filter(|(_, q)| **q == best)
            .map(|(i, _)| i)
            .collect();
        ties.choose(rng).copied()
    }
}
