//! Planner configuration

use std::path::PathBuf;
use std::str::FromStr;

use affordance_common::{ConfigError, Result};
use affordance_core::PruningConfig;
use serde::{Deserialize, Serialize};

/// Planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Discount factor γ ∈ (0, 1]
    pub gamma: f64,
    /// Seed for planner randomness (tie-breaks, sampled transitions)
    pub seed: Option<u64>,
    /// Affordance pruning configuration
    pub pruning: PruningConfig,
    /// Value iteration configuration
    pub value_iteration: ValueIterationSettings,
    /// RTDP configuration
    pub rtdp: RtdpSettings,
    /// Bounded RTDP configuration
    pub bounded_rtdp: BoundedRtdpSettings,
    /// Knowledge base to load; the demo knowledge base is used when unset
    pub knowledge_base_path: Option<PathBuf>,
    /// Parse the knowledge base in expert mode
    pub expert_knowledge_base: bool,
    /// Side length of the demo grid world
    pub grid_size: i32,
    /// Probability that a demo grid move leaves the agent in place
    pub slip: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            gamma: crate::DEFAULT_GAMMA,
            seed: None,
            pruning: PruningConfig::default(),
            value_iteration: ValueIterationSettings::default(),
            rtdp: RtdpSettings::default(),
            bounded_rtdp: BoundedRtdpSettings::default(),
            knowledge_base_path: None,
            expert_knowledge_base: false,
            grid_size: 12,
            slip: 0.1,
        }
    }
}

impl PlannerConfig {
    /// Load configuration from `.env` and `AFFORD_*` environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let cfg = Self::from_lookup(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply overrides from `lookup` on top of the defaults
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = &lookup;

        override_with(var, "AFFORD_GAMMA", &mut cfg.gamma)?;
        override_option(var, "AFFORD_SEED", &mut cfg.seed)?;

        // Pruning
        override_with(var, "AFFORD_POLICY", &mut cfg.pruning.policy)?;
        override_with(var, "AFFORD_PRIOR_SOURCE", &mut cfg.pruning.prior_source)?;
        override_with(
            var,
            "AFFORD_HARD_THRESHOLD_NUMERATOR",
            &mut cfg.pruning.hard_threshold_numerator,
        )?;
        override_with(var, "AFFORD_EXPERT_TOTAL_COUNT", &mut cfg.pruning.expert_total_count)?;
        override_option(var, "AFFORD_PRUNING_SEED", &mut cfg.pruning.seed)?;

        // Value iteration
        let vi = &mut cfg.value_iteration;
        override_with(var, "AFFORD_VI_MAX_DELTA", &mut vi.max_delta)?;
        override_with(var, "AFFORD_VI_MAX_ITERATIONS", &mut vi.max_iterations)?;
        override_with(
            var,
            "AFFORD_VI_STOP_AT_TERMINAL",
            &mut vi.stop_reachability_from_terminal_states,
        )?;

        // RTDP
        let rtdp = &mut cfg.rtdp;
        override_with(var, "AFFORD_RTDP_NUM_ROLLOUTS", &mut rtdp.num_rollouts)?;
        override_with(var, "AFFORD_RTDP_MAX_DELTA", &mut rtdp.max_delta)?;
        override_with(var, "AFFORD_RTDP_MAX_DEPTH", &mut rtdp.max_depth)?;
        override_with(
            var,
            "AFFORD_RTDP_MIN_SMALL_CHANGE_ROLLOUTS",
            &mut rtdp.min_rollouts_with_small_change,
        )?;
        override_with(var, "AFFORD_RTDP_VALUE_INIT", &mut rtdp.value_init)?;

        // Bounded RTDP
        let brtdp = &mut cfg.bounded_rtdp;
        override_with(var, "AFFORD_BRTDP_LOWER_INIT", &mut brtdp.lower_value_init)?;
        override_with(var, "AFFORD_BRTDP_UPPER_INIT", &mut brtdp.upper_value_init)?;
        override_with(var, "AFFORD_BRTDP_MAX_DIFF", &mut brtdp.max_diff)?;
        override_with(var, "AFFORD_BRTDP_MAX_ROLLOUTS", &mut brtdp.max_rollouts)?;
        override_with(var, "AFFORD_BRTDP_MAX_DEPTH", &mut brtdp.max_depth)?;

        // Demo world
        override_with(var, "AFFORD_GRID_SIZE", &mut cfg.grid_size)?;
        override_with(var, "AFFORD_SLIP", &mut cfg.slip)?;

        // Knowledge base
        if let Some(path) = var("AFFORD_KNOWLEDGE_BASE") {
            cfg.knowledge_base_path = Some(PathBuf::from(path));
        }
        override_with(var, "AFFORD_EXPERT_KB", &mut cfg.expert_knowledge_base)?;

        Ok(cfg)
    }

    /// Reject settings the planners cannot run with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(invalid("gamma", "must be in (0, 1]"));
        }
        if !(self.pruning.hard_threshold_numerator.is_finite()
            && self.pruning.hard_threshold_numerator >= 0.0)
        {
            return Err(invalid("pruning.hard_threshold_numerator", "must be finite and >= 0"));
        }
        if !(self.value_iteration.max_delta > 0.0) {
            return Err(invalid("value_iteration.max_delta", "must be > 0"));
        }
        if self.value_iteration.max_iterations == 0 {
            return Err(invalid("value_iteration.max_iterations", "must be > 0"));
        }
        if !(self.rtdp.max_delta > 0.0) {
            return Err(invalid("rtdp.max_delta", "must be > 0"));
        }
        if self.rtdp.max_depth == 0 {
            return Err(invalid("rtdp.max_depth", "must be > 0"));
        }
        if self.rtdp.num_rollouts == 0 {
            return Err(invalid("rtdp.num_rollouts", "must be > 0"));
        }
        if self.rtdp.min_rollouts_with_small_change == 0 {
            return Err(invalid("rtdp.min_rollouts_with_small_change", "must be > 0"));
        }
        if !self.rtdp.value_init.is_finite() {
            return Err(invalid("rtdp.value_init", "must be finite"));
        }
        let brtdp = &self.bounded_rtdp;
        if !(brtdp.lower_value_init.is_finite() && brtdp.upper_value_init.is_finite()) {
            return Err(invalid("bounded_rtdp", "value bounds must be finite"));
        }
        if brtdp.lower_value_init > brtdp.upper_value_init {
            return Err(invalid("bounded_rtdp.lower_value_init", "must be <= upper_value_init"));
        }
        if !(brtdp.max_diff > 0.0) {
            return Err(invalid("bounded_rtdp.max_diff", "must be > 0"));
        }
        if brtdp.max_rollouts == 0 {
            return Err(invalid("bounded_rtdp.max_rollouts", "must be > 0"));
        }
        if brtdp.max_depth == 0 {
            return Err(invalid("bounded_rtdp.max_depth", "must be > 0"));
        }
        if self.grid_size < 2 {
            return Err(invalid("grid_size", "must be >= 2"));
        }
        if !(0.0..1.0).contains(&self.slip) {
            return Err(invalid("slip", "must be in [0, 1)"));
        }
        Ok(())
    }
}

/// Value iteration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueIterationSettings {
    /// Stop once the largest change in a pass falls below this
    pub max_delta: f64,
    /// Cap on full passes
    pub max_iterations: usize,
    /// Do not expand terminal states during reachability discovery
    pub stop_reachability_from_terminal_states: bool,
}

impl Default for ValueIterationSettings {
    fn default() -> Self {
        Self {
            max_delta: crate::DEFAULT_MAX_DELTA,
            max_iterations: crate::DEFAULT_MAX_ITERATIONS,
            stop_reachability_from_terminal_states: true,
        }
    }
}

/// RTDP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtdpSettings {
    /// Cap on rollouts
    pub num_rollouts: usize,
    /// A rollout whose largest change is below this counts as small
    pub max_delta: f64,
    /// Cap on steps per rollout
    pub max_depth: usize,
    /// Consecutive small-change rollouts needed to stop
    pub min_rollouts_with_small_change: usize,
    /// Initial value of unvisited states. Should be optimistic.
    pub value_init: f64,
}

impl Default for RtdpSettings {
    fn default() -> Self {
        Self {
            num_rollouts: crate::DEFAULT_NUM_ROLLOUTS,
            max_delta: crate::DEFAULT_MAX_DELTA,
            max_depth: crate::DEFAULT_MAX_DEPTH,
            min_rollouts_with_small_change: crate::DEFAULT_MIN_SMALL_CHANGE_ROLLOUTS,
            value_init: 0.0,
        }
    }
}

/// Bounded RTDP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundedRtdpSettings {
    /// Initial lower bound. Must not exceed any true state value.
    pub lower_value_init: f64,
    /// Initial upper bound. Must not fall below any true state value.
    pub upper_value_init: f64,
    /// Stop once the initial state's margin is below this; also ends a
    /// rollout when the expected successor margin is below it
    pub max_diff: f64,
    /// Cap on rollouts
    pub max_rollouts: usize,
    /// Cap on steps per rollout
    pub max_depth: usize,
}

impl Default for BoundedRtdpSettings {
    fn default() -> Self {
        Self {
            lower_value_init: -100.0,
            upper_value_init: 0.0,
            max_diff: crate::DEFAULT_MAX_DELTA,
            max_rollouts: crate::DEFAULT_NUM_ROLLOUTS,
            max_depth: crate::DEFAULT_MAX_DEPTH,
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn override_with<F, T>(lookup: &F, key: &str, target: &mut T) -> std::result::Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = parse_value(key, &raw)?;
    }
    Ok(())
}

fn override_option<F, T>(
    lookup: &F,
    key: &str,
    target: &mut Option<T>,
) -> std::result::Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *target = Some(parse_value(key, &raw)?);
    }
    Ok(())
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> std::result::Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(key, &format!("cannot parse `{raw}`")))
}
