//! Affordance delegates
//!
//! A delegate wraps one [`AffordanceRecord`] with goal gating and
//! state-conditioned activation, and owns the record's persisted form.

pub mod knowledge_base;
pub mod persistence;

use std::fmt::Write as _;

use affordance_common::{ActionKey, LogicalExpression};
use serde::{Deserialize, Serialize};

use crate::affordance::record::AffordanceRecord;

/// Identity of a delegate: canonical (precondition, goal) descriptions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegateKey {
    pub precondition: String,
    pub goal: String,
}

impl std::fmt::Display for DelegateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.precondition, self.goal)
    }
}

pub struct AffordanceDelegate<S> {
    record: AffordanceRecord<S>,
    goal_active: bool,
}

impl<S> AffordanceDelegate<S> {
    pub fn new(record: AffordanceRecord<S>) -> Self {
        Self {
            record,
            goal_active: false,
        }
    }

    pub fn key(&self) -> DelegateKey {
        DelegateKey {
            precondition: self.record.precondition().description(),
            goal: self.record.goal().description(),
        }
    }

    /// Gate the delegate on the current goal, by structural equality of the
    /// goal descriptions
    pub fn set_current_goal(&mut self, goal: &dyn LogicalExpression<S>) {
        self.goal_active = self.record.goal().description() == goal.description();
    }

    pub fn is_goal_active(&self) -> bool {
        self.goal_active
    }

    /// Active iff the goal matches and the precondition holds in `state`
    pub fn is_active(&self, state: &S) -> bool {
        self.goal_active && self.record.precondition().evaluate(state)
    }

    /// P(active | `action` optimal); `None` when undefined
    pub fn probability_action_relevant(&self, action: &ActionKey) -> Option<f64> {
        self.record.relevance_probability(action)
    }

    pub fn record(&self) -> &AffordanceRecord<S> {
        &self.record
    }

    /// Mutable access for training loops. Not to be used while planning.
    pub fn record_mut(&mut self) -> &mut AffordanceRecord<S> {
        &mut self.record
    }

    pub fn into_record(self) -> AffordanceRecord<S> {
        self.record
    }

    /// Human-readable count table
    pub fn count_summary(&self) -> String {
        let mut out = format!("Affordance pred: {}\n", self.record.precondition().description());
        for action in self.record.actions() {
            let counts = self.record.counts(action.key()).unwrap_or_default();
            let _ = writeln!(
                out,
                "{}: {}/{}",
                action.key(),
                counts.active_optimal,
                counts.total_optimal
            );
        }
        out
    }
}

impl<S> std::fmt::Debug for AffordanceDelegate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffordanceDelegate")
            .field("key", &self.key())
            .field("goal_active", &self.goal_active)
            .finish()
    }
}

impl<S> std::fmt::Display for AffordanceDelegate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}
