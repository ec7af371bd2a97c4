//! Posterior over action optimality
//!
//! Naive-Bayes combination of affordance activations, assumed conditionally
//! independent given optimality. Undefined per-affordance estimates are
//! neutral (factor 1.0); an undefined prior makes the posterior undefined.

use std::str::FromStr;

use affordance_common::{ActionKey, ConfigError};
use serde::{Deserialize, Serialize};

use crate::delegate::AffordanceDelegate;

/// Which total-count tables the prior is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorSource {
    /// Sum the total-count tables of every registered delegate
    Pooled,
    /// Read only the first registered delegate's table, assuming all
    /// delegates share one total-count table
    FirstDelegate,
}

impl std::fmt::Display for PriorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriorSource::Pooled => write!(f, "pooled"),
            PriorSource::FirstDelegate => write!(f, "first_delegate"),
        }
    }
}

impl FromStr for PriorSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pooled" => Ok(PriorSource::Pooled),
            "first_delegate" | "first" => Ok(PriorSource::FirstDelegate),
            _ => Err(ConfigError::UnknownPriorSource(s.to_string())),
        }
    }
}

/// Evidence for one state: the registered delegates and which are active
pub(crate) struct Evidence<'a, S> {
    delegates: &'a [AffordanceDelegate<S>],
    active: Vec<bool>,
    prior_source: PriorSource,
}

impl<'a, S> Evidence<'a, S> {
    /// Evaluate every delegate's activation once for `state`
    pub(crate) fn observe(
        delegates: &'a [AffordanceDelegate<S>],
        state: &S,
        prior_source: PriorSource,
    ) -> Self {
        let active = delegates.iter().map(|d| d.is_active(state)).collect();
        Self {
            delegates,
            active,
            prior_source,
        }
    }

    #[cfg(test)]
    pub(crate) fn active(&self) -> &[bool] {
        &self.active
    }

    /// π(a): share of optimal visits that went to `action`
    pub(crate) fn prior(&self, action: &ActionKey) -> Option<f64> {
        // Pooled sums across delegates may exceed u64
        let (count, total) = match self.prior_source {
            PriorSource::Pooled => self.delegates.iter().fold((0u128, 0u128), |(c, t), d| {
                let record = d.record();
                (
                    c + u128::from(record.total_optimal_count(action).unwrap_or(0)),
                    t + u128::from(record.total_count_sum()),
                )
            }),
            PriorSource::FirstDelegate => {
                let record = self.delegates.first()?.record();
                (
                    u128::from(record.total_optimal_count(action)?),
                    u128::from(record.total_count_sum()),
                )
            }
        };

        if total == 0 {
            return None;
        }
        Some(count as f64 / total as f64)
    }

    /// L⁺(a) = Π_d P(d active | a optimal), complemented for inactive d
    pub(crate) fn positive_likelihood(&self, action: &ActionKey) -> f64 {
        self.likelihood(|d| d.probability_action_relevant(action))
    }

    /// L⁻(a) = Π_d P(d active | a not optimal), complemented for inactive d
    pub(crate) fn negative_likelihood(&self, action: &ActionKey) -> f64 {
        self.likelihood(|d| d.record().not_optimal_activation_frequency(action))
    }

    fn likelihood<F>(&self, estimate: F) -> f64
    where
        F: Fn(&AffordanceDelegate<S>) -> Option<f64>,
    {
        self.delegates
            .iter()
            .zip(&self.active)
            .map(|(d, &active)| match estimate(d) {
                Some(p) if active => p,
                Some(p) => 1.0 - p,
                None => 1.0,
            })
            .product()
    }

    /// P(a optimal | evidence). Falls back to the prior when both hypotheses
    /// have zero likelihood.
    pub(crate) fn posterior(&self, action: &ActionKey) -> Option<f64> {
        let prior = self.prior(action)?;
        let positive = self.positive_likelihood(action) * prior;
        let negative = self.negative_likelihood(action) * (1.0 - prior);
        let denominator = positive + negative;

        if denominator <= 0.0 || !denominator.is_finite() {
            return Some(prior);
        }
        Some(positive / denominator)
    }
}
