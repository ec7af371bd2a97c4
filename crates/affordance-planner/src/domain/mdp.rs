//! Task definition shared by the planners

use std::sync::Arc;

use affordance_common::{ActionKey, PlannerError, RewardFunction, TerminalFunction};

/// Reward, termination and discount of a planning task
pub struct Mdp<S> {
    reward: Arc<dyn RewardFunction<S>>,
    terminal: Arc<dyn TerminalFunction<S>>,
    gamma: f64,
}

impl<S> Mdp<S> {
    pub fn new(
        reward: Arc<dyn RewardFunction<S>>,
        terminal: Arc<dyn TerminalFunction<S>>,
        gamma: f64,
    ) -> Result<Self, PlannerError> {
        if !(gamma > 0.0 && gamma <= 1.0) {
            return Err(PlannerError::InvalidDiscount(gamma.to_string()));
        }
        Ok(Self {
            reward,
            terminal,
            gamma,
        })
    }

    pub fn reward(&self, state: &S, action: &ActionKey, next: &S) -> f64 {
        self.reward.reward(state, action, next)
    }

    pub fn is_terminal(&self, state: &S) -> bool {
        self.terminal.is_terminal(state)
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl<S> Clone for Mdp<S> {
    fn clone(&self) -> Self {
        Self {
            reward: Arc::clone(&self.reward),
            terminal: Arc::clone(&self.terminal),
            gamma: self.gamma,
        }
    }
}

impl<S> std::fmt::Debug for Mdp<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mdp").field("gamma", &self.gamma).finish()
    }
}
