//! Selection policy: which posteriors survive pruning

use std::str::FromStr;

use affordance_common::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Keep actions whose posterior exceeds the hard threshold
    Threshold,
    /// Keep every action with non-zero support
    ExpertUnion,
    /// Keep each action with probability equal to its posterior
    Sample,
}

impl SelectionPolicy {
    /// Whether an action with `posterior` is kept. `Sample` consumes one
    /// uniform draw from `rng` per call.
    pub fn keeps<R: Rng>(&self, posterior: f64, hard_threshold: f64, rng: &mut R) -> bool {
        match self {
            SelectionPolicy::Threshold => posterior > hard_threshold,
            SelectionPolicy::ExpertUnion => posterior > 0.0,
            SelectionPolicy::Sample => posterior > rng.gen::<f64>(),
        }
    }

    /// Whether repeated calls on the same evidence can disagree
    pub fn is_stochastic(&self) -> bool {
        matches!(self, SelectionPolicy::Sample)
    }
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::Threshold => write!(f, "threshold"),
            SelectionPolicy::ExpertUnion => write!(f, "expert_union"),
            SelectionPolicy::Sample => write!(f, "sample"),
        }
    }
}

impl FromStr for SelectionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "threshold" | "hard" => Ok(SelectionPolicy::Threshold),
            "expert_union" | "expert" => Ok(SelectionPolicy::ExpertUnion),
            "sample" | "soft" => Ok(SelectionPolicy::Sample),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_threshold_is_strict() {
        let mut rng = StdRng::seed_from_u64(1);
        let policy = SelectionPolicy::Threshold;
        assert!(policy.keeps(0.11, 0.1, &mut rng));
        assert!(!policy.keeps(0.1, 0.1, &mut rng));
    }

    #[test]
    fn test_expert_union_keeps_any_support() {
        let mut rng = StdRng::seed_from_u64(1);
        let policy = SelectionPolicy::ExpertUnion;
        assert!(policy.keeps(1e-9, 0.5, &mut rng));
        assert!(!policy.keeps(0.0, 0.5, &mut rng));
    }

    #[test]
    fn test_sample_extremes() {
        let mut rng = StdRng::seed_from_u64(1);
        let policy = SelectionPolicy::Sample;
        for _ in 0..100 {
            assert!(policy.keeps(1.0, 0.0, &mut rng));
            assert!(!policy.keeps(0.0, 0.0, &mut rng));
        }
    }

    #[test]
    fn test_sample_frequency_tracks_posterior() {
        let mut rng = StdRng::seed_from_u64(42);
        let policy = SelectionPolicy::Sample;
        let kept = (0..10_000).filter(|_| policy.keeps(0.3, 0.0, &mut rng)).count();
        assert!((2_700..3_300).contains(&kept));
    }

    #[test]
    fn test_parse() {
        assert_eq!("threshold".parse::<SelectionPolicy>(), Ok(SelectionPolicy::Threshold));
        assert_eq!("Expert-Union".parse::<SelectionPolicy>(), Ok(SelectionPolicy::ExpertUnion));
        assert_eq!("soft".parse::<SelectionPolicy>(), Ok(SelectionPolicy::Sample));
        assert_eq!(
            "greedy".parse::<SelectionPolicy>(),
            Err(ConfigError::UnknownPolicy("greedy".to_string()))
        );
        assert_eq!(SelectionPolicy::ExpertUnion.to_string(), "expert_union");
    }
}
