//! # Affordance Planner
//!
//! Bellman-backup planners that consult an [`ActionSetProvider`] instead of
//! the domain's full action set at every expansion and backup.
//!
//! ## Planners
//!
//! - [`ValueIteration`]: discovers the states reachable from an initial state
//!   under the pruned transition model, then sweeps them until the value
//!   function stops changing.
//! - [`Rtdp`]: greedy rollouts from an initial state, backing up each visited
//!   state over the pruned action set.
//! - [`BoundedRtdp`]: RTDP on a lower and an upper value bound, sampling
//!   successors where the bounds disagree until they meet at the initial
//!   state.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │  ValueIteration / Rtdp / BoundedRtdp (plan)    │
//! │   ┌──────────────┐      ┌──────────────────┐   │
//! │   │ ValueFunction│      │ ActionTransitions│   │
//! │   └──────┬───────┘      └────────┬─────────┘   │
//! │          │                       │             │
//! │   ┌──────┴───────────────────────┴─────────┐   │
//! │   │           ActionSetProvider            │   │
//! │   │ FullActionSet | AffordancePruning-     │   │
//! │   │               |   Controller           │   │
//! │   └────────────────────────────────────────┘   │
//! └────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod domain;
pub mod gridworld;
pub mod provider;

pub use config::{BoundedRtdpSettings, PlannerConfig, RtdpSettings, ValueIterationSettings};
pub use domain::bounded_rtdp::{BoundedRtdp, BoundedRtdpReport};
pub use domain::mdp::Mdp;
pub use domain::rtdp::{Rtdp, RtdpReport};
pub use domain::value_function::{ActionTransitions, ValueFunction};
pub use domain::value_iteration::{BackupReport, Phase, ValueIteration};
pub use provider::{ActionSetProvider, FullActionSet};

/// Planner version
pub const PLANNER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default discount factor
pub const DEFAULT_GAMMA: f64 = 0.99;

/// Default convergence threshold on the per-pass (or per-rollout) value change
pub const DEFAULT_MAX_DELTA: f64 = 0.001;

/// Default cap on value-iteration passes
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Default cap on RTDP rollouts
pub const DEFAULT_NUM_ROLLOUTS: usize = 1000;

/// Default RTDP rollout depth
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Default number of consecutive small-change rollouts before RTDP stops
pub const DEFAULT_MIN_SMALL_CHANGE_ROLLOUTS: usize = 5;

/// Draw a seed from entropy when none is configured, logging it for replay
pub(crate) fn resolve_seed(seed: Option<u64>, component: &str) -> u64 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            tracing::info!(seed, component, "no seed configured, drew one from entropy");
            seed
        }
    }
}
