//! MDP collaborator interfaces
//!
//! The domain representation, transition model, reward and terminal
//! functions are supplied by the caller. States act as their own canonical
//! hash key, so they must be `Clone + Eq + Hash`.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use rand::Rng;
use tracing::warn;

use super::action_key::ActionKey;
use super::logic::{free_variables, PropositionalFunction};

/// Marker for types usable as MDP states
pub trait MdpState: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> MdpState for T {}

/// One outcome of applying an action
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionProbability<S> {
    pub state: S,
    pub probability: f64,
}

impl<S> TransitionProbability<S> {
    pub fn new(state: S, probability: f64) -> Self {
        Self { state, probability }
    }

    /// A deterministic outcome
    pub fn certain(state: S) -> Self {
        Self::new(state, 1.0)
    }
}

/// An action schema provided by the domain
pub trait Action<S> {
    /// Name as registered with the domain
    fn name(&self) -> &str;

    /// Object classes of the formal parameters
    fn parameter_classes(&self) -> &[String];

    /// Outcome distribution of applying the action under `params` in `state`.
    /// An empty list means the action is not applicable in `state`.
    fn transitions(&self, state: &S, params: &[String]) -> Vec<TransitionProbability<S>>;
}

/// Action registry and predicate vocabulary of a domain
pub trait Domain<S> {
    /// Look up a primitive action by name
    fn action(&self, name: &str) -> Option<Arc<dyn Action<S>>>;

    /// Look up a propositional function by name
    fn propositional_function(&self, name: &str) -> Option<Arc<dyn PropositionalFunction<S>>>;

    /// All primitive actions
    fn actions(&self) -> Vec<Arc<dyn Action<S>>>;

    /// All primitive actions grounded with free-variable parameters
    fn grounded_actions(&self) -> Vec<GroundedAction<S>> {
        self.actions()
            .into_iter()
            .map(GroundedAction::with_free_variables)
            .collect()
    }
}

/// Immediate reward of a transition
pub trait RewardFunction<S> {
    fn reward(&self, state: &S, action: &ActionKey, next: &S) -> f64;
}

impl<S, F> RewardFunction<S> for F
where
    F: Fn(&S, &ActionKey, &S) -> f64,
{
    fn reward(&self, state: &S, action: &ActionKey, next: &S) -> f64 {
        self(state, action, next)
    }
}

/// Terminal-state test
pub trait TerminalFunction<S> {
    fn is_terminal(&self, state: &S) -> bool;
}

impl<S, F> TerminalFunction<S> for F
where
    F: Fn(&S) -> bool,
{
    fn is_terminal(&self, state: &S) -> bool {
        self(state)
    }
}

/// An action together with concrete parameter bindings.
///
/// Equality and hashing go through the [`ActionKey`] only.
pub struct GroundedAction<S> {
    key: ActionKey,
    action: Arc<dyn Action<S>>,
}

impl<S> GroundedAction<S> {
    pub fn new(action: Arc<dyn Action<S>>, params: Vec<String>) -> Self {
        let key = ActionKey::new(action.name(), params);
        Self { key, action }
    }

    /// Bind every parameter to a free variable derived from its class
    pub fn with_free_variables(action: Arc<dyn Action<S>>) -> Self {
        let params = free_variables(action.parameter_classes());
        Self::new(action, params)
    }

    pub fn key(&self) -> &ActionKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn params(&self) -> &[String] {
        self.key.params()
    }

    pub fn action(&self) -> &Arc<dyn Action<S>> {
        &self.action
    }

    /// Outcome distribution in `state`
    pub fn transitions(&self, state: &S) -> Vec<TransitionProbability<S>> {
        self.action.transitions(state, self.key.params())
    }

    /// Sample a successor of `state`. Returns `None` when the action is not
    /// applicable.
    pub fn execute_in<R: Rng>(&self, state: &S, rng: &mut R) -> Option<S> {
        let mut outcomes = self.transitions(state);
        if outcomes.len() <= 1 {
            return outcomes.pop().map(|tp| tp.state);
        }

        let total: f64 = outcomes.iter().map(|tp| tp.probability).sum();
        if (total - 1.0).abs() > 1e-6 {
            warn!(action = %self.key, total, "transition probabilities do not sum to one");
        }

        let draw = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let last = outcomes.len() - 1;
        for (i, tp) in outcomes.into_iter().enumerate() {
            cumulative += tp.probability;
            if draw < cumulative || i == last {
                return Some(tp.state);
            }
        }
        None
    }
}

impl<S> Clone for GroundedAction<S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            action: Arc::clone(&self.action),
        }
    }
}

impl<S> PartialEq for GroundedAction<S> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<S> Eq for GroundedAction<S> {}

impl<S> Hash for GroundedAction<S> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<S> Debug for GroundedAction<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("GroundedAction").field(&self.key).finish()
    }
}

impl<S> std::fmt::Display for GroundedAction<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}
