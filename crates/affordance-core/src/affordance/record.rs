//! Affordance record: a (precondition, goal) pair with per-action counts
//!
//! - `active_optimal[a]`: times the affordance was active while `a` was optimal
//! - `total_optimal[a]`: times `a` was optimal overall
//!
//! Both tables share the record's known action set and never decrease.
//! `active_optimal[a] <= total_optimal[a]` holds for every action.

use std::collections::HashMap;
use std::sync::Arc;

use affordance_common::{ActionKey, GroundedAction, LogicalExpression, RecordError};
use serde::{Deserialize, Serialize};

/// Per-action count entry used when building a record from persisted data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionCounts {
    pub active_optimal: u64,
    pub total_optimal: u64,
}

impl ActionCounts {
    pub fn new(active_optimal: u64, total_optimal: u64) -> Self {
        Self {
            active_optimal,
            total_optimal,
        }
    }
}

/// The statistical unit of the affordance model
pub struct AffordanceRecord<S> {
    precondition: Arc<dyn LogicalExpression<S>>,
    goal: Arc<dyn LogicalExpression<S>>,
    /// Known action set, in construction order
    actions: Vec<GroundedAction<S>>,
    counts: HashMap<ActionKey, ActionCounts>,
    /// Σ active_optimal, i.e. the number of recorded activations
    active_sum: u64,
    /// Σ total_optimal
    total_sum: u64,
}

impl<S> AffordanceRecord<S> {
    /// Create a record with zero counts for every action
    pub fn new(
        precondition: Arc<dyn LogicalExpression<S>>,
        goal: Arc<dyn LogicalExpression<S>>,
        actions: Vec<GroundedAction<S>>,
    ) -> Self {
        let mut record = Self {
            precondition,
            goal,
            actions: Vec::with_capacity(actions.len()),
            counts: HashMap::with_capacity(actions.len()),
            active_sum: 0,
            total_sum: 0,
        };
        for action in actions {
            if !record.counts.contains_key(action.key()) {
                record.counts.insert(action.key().clone(), ActionCounts::default());
                record.actions.push(action);
            }
        }
        record
    }

    /// Create a record from known counts, validating the count invariant
    pub fn with_counts(
        precondition: Arc<dyn LogicalExpression<S>>,
        goal: Arc<dyn LogicalExpression<S>>,
        entries: Vec<(GroundedAction<S>, ActionCounts)>,
    ) -> Result<Self, RecordError> {
        let actions = entries.iter().map(|(a, _)| a.clone()).collect();
        let mut record = Self::new(precondition, goal, actions);

        for (action, counts) in entries {
            if counts.active_optimal > counts.total_optimal {
                return Err(RecordError::CountInvariant {
                    action: action.key().to_string(),
                    active: counts.active_optimal,
                    total: counts.total_optimal,
                });
            }
            record.counts.insert(action.key().clone(), counts);
        }

        let (active_sum, total_sum) = match (
            checked_sum(record.counts.values().map(|c| c.active_optimal)),
            checked_sum(record.counts.values().map(|c| c.total_optimal)),
        ) {
            (Some(active), Some(total)) => (active, total),
            _ => return Err(RecordError::CountOverflow(record.to_string())),
        };
        record.active_sum = active_sum;
        record.total_sum = total_sum;
        Ok(record)
    }

    pub fn precondition(&self) -> &Arc<dyn LogicalExpression<S>> {
        &self.precondition
    }

    pub fn goal(&self) -> &Arc<dyn LogicalExpression<S>> {
        &self.goal
    }

    /// Known action set
    pub fn actions(&self) -> &[GroundedAction<S>] {
        &self.actions
    }

    pub fn contains(&self, action: &ActionKey) -> bool {
        self.counts.contains_key(action)
    }

    pub fn counts(&self, action: &ActionKey) -> Option<ActionCounts> {
        self.counts.get(action).copied()
    }

    pub fn active_optimal_count(&self, action: &ActionKey) -> Option<u64> {
        self.counts.get(action).map(|c| c.active_optimal)
    }

    pub fn total_optimal_count(&self, action: &ActionKey) -> Option<u64> {
        self.counts.get(action).map(|c| c.total_optimal)
    }

    /// Σ active-optimal counts
    pub fn active_count_sum(&self) -> u64 {
        self.active_sum
    }

    /// Σ total-optimal counts
    pub fn total_count_sum(&self) -> u64 {
        self.total_sum
    }

    /// Number of recorded activations of this affordance
    pub fn num_activations(&self) -> u64 {
        self.active_sum
    }

    /// Maximum-likelihood estimate of P(affordance active | `action` optimal).
    ///
    /// Unsmoothed. Returns `None` when the action is unknown or has never been
    /// optimal, where the estimate is undefined.
    pub fn relevance_probability(&self, action: &ActionKey) -> Option<f64> {
        let counts = self.counts.get(action)?;
        if counts.total_optimal == 0 {
            return None;
        }
        Some(counts.active_optimal as f64 / counts.total_optimal as f64)
    }

    /// Empirical P(affordance active | `action` not optimal):
    /// `(Σ active − active[a]) / (Σ total − total[a])`.
    ///
    /// Returns `None` for unknown actions and when every optimal visit went
    /// to `action`.
    pub fn not_optimal_activation_frequency(&self, action: &ActionKey) -> Option<f64> {
        let counts = self.counts.get(action)?;
        let denominator = self.total_sum - counts.total_optimal;
        if denominator == 0 {
            return None;
        }
        let numerator = self.active_sum - counts.active_optimal;
        Some(numerator as f64 / denominator as f64)
    }

    /// Record that `action` was optimal while this affordance was active.
    ///
    /// The matching total count must already have been recorded.
    pub fn increment_active_optimal(&mut self, action: &ActionKey) -> Result<(), RecordError> {
        let counts = self
            .counts
            .get_mut(action)
            .ok_or_else(|| RecordError::UnknownAction(action.to_string()))?;

        // active <= total <= u64::MAX, so the invariant check also rules out overflow
        if counts.active_optimal >= counts.total_optimal {
            return Err(RecordError::CountInvariant {
                action: action.to_string(),
                active: counts.active_optimal.saturating_add(1),
                total: counts.total_optimal,
            });
        }

        counts.active_optimal += 1;
        self.active_sum += 1;
        Ok(())
    }

    /// Record that `action` was optimal
    pub fn increment_total_optimal(&mut self, action: &ActionKey) -> Result<(), RecordError> {
        let counts = self
            .counts
            .get_mut(action)
            .ok_or_else(|| RecordError::UnknownAction(action.to_string()))?;

        let total_sum = self
            .total_sum
            .checked_add(1)
            .ok_or_else(|| RecordError::CountOverflow(action.to_string()))?;
        counts.total_optimal += 1;
        self.total_sum = total_sum;
        Ok(())
    }

    /// Whether `other` carries exactly the same total-count table
    pub fn same_totals_as(&self, other: &AffordanceRecord<S>) -> bool {
        self.counts.len() == other.counts.len()
            && self.counts.iter().all(|(key, counts)| {
                other.total_optimal_count(key) == Some(counts.total_optimal)
            })
    }
}

fn checked_sum(mut values: impl Iterator<Item = u64>) -> Option<u64> {
    values.try_fold(0u64, u64::checked_add)
}

impl<S> std::fmt::Debug for AffordanceRecord<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffordanceRecord")
            .field("precondition", &self.precondition.description())
            .field("goal", &self.goal.description())
            .field("counts", &self.counts)
            .finish()
    }
}

impl<S> std::fmt::Display for AffordanceRecord<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{}",
            self.precondition.description(),
            self.goal.description()
        )
    }
}
