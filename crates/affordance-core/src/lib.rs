//! # Affordance Core
//!
//! Bayesian action pruning from learned affordances.
//!
//! ## Posterior
//!
//! ```text
//! P(a optimal | evidence) = L⁺(a)·π(a) / (L⁺(a)·π(a) + L⁻(a)·(1 − π(a)))
//! ```
//!
//! Where:
//! - π(a): prior, share of optimal-action visits that went to `a`
//! - L⁺(a): Π over affordances of P(active | a optimal), complemented when inactive
//! - L⁻(a): Π over affordances of P(active | a not optimal), complemented when inactive
//!
//! ## Selection
//!
//! Actions are kept by threshold (`posterior > 0.2 / |A|`), by expert union
//! (`posterior > 0`) or by sampling (`posterior > u`, `u ~ U[0,1)`). An empty
//! selection falls back to the full action set.

pub mod affordance;
pub mod controller;
pub mod delegate;
pub mod selection;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

pub use affordance::record::AffordanceRecord;
pub use controller::posterior::PriorSource;
pub use controller::AffordancePruningController;
pub use delegate::knowledge_base::KnowledgeBase;
pub use delegate::persistence::LoadOptions;
pub use delegate::{AffordanceDelegate, DelegateKey};
pub use selection::policy::SelectionPolicy;
pub use telemetry::PruningStats;

/// Numerator of the threshold-policy cutoff `numerator / |actions|`
pub const DEFAULT_HARD_THRESHOLD_NUMERATOR: f64 = 0.2;

/// Total-count default used for expert knowledge bases whose lines omit the
/// total column. Legacy value carried by existing expert knowledge bases.
pub const DEFAULT_EXPERT_TOTAL_COUNT: u64 = 900;

/// Pruning controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningConfig {
    /// How posteriors are turned into an action subset
    pub policy: SelectionPolicy,
    /// Which count tables the prior is computed from
    pub prior_source: PriorSource,
    /// Threshold-policy cutoff numerator
    pub hard_threshold_numerator: f64,
    /// Expert-mode total-count default
    pub expert_total_count: u64,
    /// Seed for the sampling policy; `None` draws one from entropy
    pub seed: Option<u64>,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::Threshold,
            prior_source: PriorSource::Pooled,
            hard_threshold_numerator: DEFAULT_HARD_THRESHOLD_NUMERATOR,
            expert_total_count: DEFAULT_EXPERT_TOTAL_COUNT,
            seed: None,
        }
    }
}

impl PruningConfig {
    /// Configuration for a given policy with everything else at defaults
    pub fn with_policy(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Fix the random seed
    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
