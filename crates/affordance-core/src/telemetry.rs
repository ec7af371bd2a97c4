//! Pruning telemetry

use serde::{Deserialize, Serialize};

/// Running counters over `pruned_actions_for_state` calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruningStats {
    /// Number of pruning queries
    pub queries: u64,
    /// Σ candidate actions considered
    pub candidate_actions: u64,
    /// Σ actions returned
    pub returned_actions: u64,
    /// Queries that fell back to the full action set
    pub fallbacks: u64,
    /// Posteriors that were undefined (no usable counts)
    pub undefined_posteriors: u64,
}

impl PruningStats {
    pub(crate) fn record_query(
        &mut self,
        candidates: usize,
        returned: usize,
        fallback: bool,
        undefined: usize,
    ) {
        self.queries += 1;
        self.candidate_actions += candidates as u64;
        self.returned_actions += returned as u64;
        self.undefined_posteriors += undefined as u64;
        if fallback {
            self.fallbacks += 1;
        }
    }

    /// Mean fraction of the action set kept per query (1.0 before any query)
    pub fn mean_kept_fraction(&self) -> f64 {
        if self.candidate_actions == 0 {
            return 1.0;
        }
        self.returned_actions as f64 / self.candidate_actions as f64
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
