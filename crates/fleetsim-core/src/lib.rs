//! Core learning primitives shared across the fleetsim workspace.
//!
//! Agents adapt their strategies (gear, destination, regulatory response) online. This crate
//! holds the pieces that carry no knowledge of geography or of the adaptation controller:
//!
//! - [`estimator`]: running estimates of one arm's value (iterative, exponential, windowed).
//! - [`average`]: a sparse, lazily populated collection of estimators, one per arm.
//! - [`bandit`]: arm-selection policies (epsilon-greedy, UCB1, softmax).
//! - [`switch`]: maps a large discrete domain onto a dense arm space.
//! - [`probability`]: per-tick explore/imitate probabilities and how they anneal.
//! - [`network`]: the directed friendship graph agents imitate through.
//!
//! Every operation that consumes randomness takes the caller's generator explicitly so a fixed
//! seed and a fixed stepping order reproduce a run bit for bit.

use slotmap::new_key_type;
use thiserror::Error;

pub mod average;
pub mod bandit;
pub mod estimator;
pub mod network;
pub mod probability;
pub mod switch;

pub use average::{BanditAverage, EstimatorFactory};
pub use bandit::{BanditAlgorithm, BanditConfig, BanditKind, EpsilonGreedy, Softmax, Ucb1};
pub use estimator::{
    Estimator, EstimatorKind, ExponentialAverage, IterativeAverage, WindowedAverage,
};
pub use network::SocialNetwork;
pub use probability::{AdaptationProbability, PeriodReport, ProbabilityConfig};
pub use switch::BanditSwitch;

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
}

/// Errors raised when constructing or feeding learning components.
#[derive(Debug, Error, PartialEq)]
pub enum LearningError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// UCB1 cannot normalise rewards when the bounds are degenerate.
    #[error("reward bounds must satisfy min < max (min={min}, max={max})")]
    InvalidRewardBounds { min: f64, max: f64 },
    /// A probability outside `[0, 1]`.
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    /// Reward reported for an arm the bandit does not know about.
    #[error("arm {arm} is outside the {arms} declared arms")]
    UnknownArm { arm: usize, arms: usize },
    /// Rewards must be finite to be averaged.
    #[error("reward must be finite, got {0}")]
    NonFiniteReward(f64),
    /// A social network needs somebody to befriend.
    #[error("social network needs at least two agents, got {0}")]
    NetworkTooSmall(usize),
}

pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<f64, LearningError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(LearningError::InvalidProbability { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_check_rejects_nan_and_out_of_range() {
        assert_eq!(check_probability("p", 0.0), Ok(0.0));
        assert_eq!(check_probability("p", 1.0), Ok(1.0));
        assert!(check_probability("p", -0.01).is_err());
        assert!(check_probability("p", 1.01).is_err());
        assert!(check_probability("p", f64::NAN).is_err());
    }

    #[test]
    fn errors_render_offending_values() {
        let err = LearningError::InvalidRewardBounds {
            min: 10.0,
            max: -10.0,
        };
        assert_eq!(
            err.to_string(),
            "reward bounds must satisfy min < max (min=10, max=-10)"
        );
        let err = LearningError::UnknownArm { arm: 7, arms: 3 };
        assert_eq!(err.to_string(), "arm 7 is outside the 3 declared arms");
    }
}
