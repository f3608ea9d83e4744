//! Arm-selection policies over a [`BanditAverage`].

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::average::BanditAverage;
use crate::estimator::EstimatorKind;
use crate::{LearningError, check_probability};

/// Policy parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BanditKind {
    EpsilonGreedy {
        exploration_rate: f64,
    },
    /// Rewards are normalised by `(r - min_reward) / (max_reward - min_reward)`.
    Ucb1 {
        min_reward: f64,
        max_reward: f64,
    },
    /// Temperature is multiplied by `temperature_decay` after each choice.
    Softmax {
        temperature: f64,
        temperature_decay: f64,
    },
}

impl Default for BanditKind {
    fn default() -> Self {
        Self::EpsilonGreedy {
            exploration_rate: 0.2,
        }
    }
}

/// Everything needed to build a bandit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BanditConfig {
    pub arms: usize,
    #[serde(default)]
    pub estimator: EstimatorKind,
    #[serde(default)]
    pub policy: BanditKind,
}

impl BanditConfig {
    pub fn build(&self) -> Result<BanditAlgorithm, LearningError> {
        let average = BanditAverage::new(self.arms, self.estimator)?;
        Ok(match self.policy {
            BanditKind::EpsilonGreedy { exploration_rate } => {
                BanditAlgorithm::EpsilonGreedy(EpsilonGreedy::new(average, exploration_rate)?)
            }
            BanditKind::Ucb1 {
                min_reward,
                max_reward,
            } => BanditAlgorithm::Ucb1(Ucb1::new(average, min_reward, max_reward)?),
            BanditKind::Softmax {
                temperature,
                temperature_decay,
            } => BanditAlgorithm::Softmax(Softmax::new(average, temperature, temperature_decay)?),
        })
    }
}

/// Greedy with probability `1 - epsilon`, uniform over all arms otherwise.
#[derive(Debug)]
pub struct EpsilonGreedy {
    average: BanditAverage,
    exploration_rate: f64,
}

impl EpsilonGreedy {
    pub fn new(average: BanditAverage, exploration_rate: f64) -> Result<Self, LearningError> {
        check_probability("exploration rate", exploration_rate)?;
        Ok(Self {
            average,
            exploration_rate,
        })
    }

    #[must_use]
    pub const fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn set_exploration_rate(&mut self, rate: f64) -> Result<(), LearningError> {
        self.exploration_rate = check_probability("exploration rate", rate)?;
        Ok(())
    }

    pub fn choose_arm(&mut self, rng: &mut dyn RngCore) -> usize {
        if self.exploration_rate > 0.0 && rng.random_bool(self.exploration_rate) {
            rng.random_range(0..self.average.arms())
        } else {
            self.average.best_arm()
        }
    }

    pub fn observe_reward(&mut self, reward: f64, arm: usize) -> Result<(), LearningError> {
        self.average.observe(arm, reward)
    }
}

/// Upper confidence bound (UCB1) over rewards normalised into the configured bounds.
///
/// Any arm that was never observed is played before the confidence formula is consulted.
#[derive(Debug)]
pub struct Ucb1 {
    average: BanditAverage,
    min_reward: f64,
    max_reward: f64,
    exploration_weight: f64,
}

impl Ucb1 {
    pub fn new(
        average: BanditAverage,
        min_reward: f64,
        max_reward: f64,
    ) -> Result<Self, LearningError> {
        if !(min_reward.is_finite() && max_reward.is_finite() && min_reward < max_reward) {
            return Err(LearningError::InvalidRewardBounds {
                min: min_reward,
                max: max_reward,
            });
        }
        Ok(Self {
            average,
            min_reward,
            max_reward,
            exploration_weight: 1.0,
        })
    }

    /// Out-of-bounds rewards are normalised outside `[0, 1]`, not clamped.
    #[must_use]
    pub fn normalize(&self, reward: f64) -> f64 {
        (reward - self.min_reward) / (self.max_reward - self.min_reward)
    }

    /// The stored estimate for `arm` expressed back in reward units.
    #[must_use]
    pub fn estimated_reward(&self, arm: usize) -> f64 {
        self.min_reward + self.average.average(arm) * (self.max_reward - self.min_reward)
    }

    pub fn set_exploration_weight(&mut self, weight: f64) -> Result<(), LearningError> {
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(LearningError::InvalidConfig(
                "UCB1 exploration weight must be finite and non-negative",
            ));
        }
        self.exploration_weight = weight;
        Ok(())
    }

    pub fn choose_arm(&mut self, _rng: &mut dyn RngCore) -> usize {
        let arms = self.average.arms();
        if let Some(untried) = (0..arms).find(|&arm| self.average.observations(arm) == 0) {
            return untried;
        }

        let total = self.average.total_observations() as f64;
        let log_total = total.ln();
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for arm in 0..arms {
            let plays = self.average.observations(arm) as f64;
            let bonus = self.exploration_weight * (2.0 * log_total / plays).sqrt();
            let score = self.average.average(arm) + bonus;
            if score > best_score {
                best = arm;
                best_score = score;
            }
        }
        best
    }

    pub fn observe_reward(&mut self, reward: f64, arm: usize) -> Result<(), LearningError> {
        if !reward.is_finite() {
            return Err(LearningError::NonFiniteReward(reward));
        }
        let normalized = self.normalize(reward);
        self.average.observe(arm, normalized)
    }
}

/// Boltzmann exploration with an annealing temperature.
#[derive(Debug)]
pub struct Softmax {
    average: BanditAverage,
    temperature: f64,
    temperature_decay: f64,
    greedy: bool,
}

impl Softmax {
    pub fn new(
        average: BanditAverage,
        temperature: f64,
        temperature_decay: f64,
    ) -> Result<Self, LearningError> {
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(LearningError::InvalidConfig(
                "softmax temperature must be finite and positive",
            ));
        }
        if !(temperature_decay > 0.0 && temperature_decay <= 1.0) {
            return Err(LearningError::InvalidConfig(
                "softmax temperature decay must lie in (0, 1]",
            ));
        }
        Ok(Self {
            average,
            temperature,
            temperature_decay,
            greedy: false,
        })
    }

    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn choose_arm(&mut self, rng: &mut dyn RngCore) -> usize {
        // A temperature annealed into the subnormal range would overflow the scaled values.
        if self.greedy || self.temperature < f64::MIN_POSITIVE {
            return self.average.best_arm();
        }

        let arms = self.average.arms();
        let scaled: Vec<f64> = (0..arms)
            .map(|arm| self.average.average(arm) / self.temperature)
            .collect();
        let max = scaled.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = scaled.iter().map(|value| (value - max).exp()).collect();
        let total: f64 = weights.iter().sum();

        let mut target = rng.random::<f64>() * total;
        let mut chosen = arms - 1;
        for (arm, weight) in weights.iter().enumerate() {
            if target < *weight {
                chosen = arm;
                break;
            }
            target -= weight;
        }

        self.temperature *= self.temperature_decay;
        chosen
    }

    pub fn observe_reward(&mut self, reward: f64, arm: usize) -> Result<(), LearningError> {
        self.average.observe(arm, reward)
    }
}

/// A bandit policy chosen at configuration time.
#[derive(Debug)]
pub enum BanditAlgorithm {
    EpsilonGreedy(EpsilonGreedy),
    Ucb1(Ucb1),
    Softmax(Softmax),
}

impl BanditAlgorithm {
    /// Pick the next arm to play.
    pub fn choose_arm(&mut self, rng: &mut dyn RngCore) -> usize {
        let arm = match self {
            Self::EpsilonGreedy(inner) => inner.choose_arm(rng),
            Self::Ucb1(inner) => inner.choose_arm(rng),
            Self::Softmax(inner) => inner.choose_arm(rng),
        };
        trace!(arm, "bandit chose arm");
        arm
    }

    /// Report the reward obtained by playing `arm`.
    pub fn observe_reward(&mut self, reward: f64, arm: usize) -> Result<(), LearningError> {
        match self {
            Self::EpsilonGreedy(inner) => inner.observe_reward(reward, arm),
            Self::Ucb1(inner) => inner.observe_reward(reward, arm),
            Self::Softmax(inner) => inner.observe_reward(reward, arm),
        }
    }

    /// Stop exploring: epsilon drops to zero, the UCB bonus vanishes, softmax turns greedy.
    pub fn freeze_exploration(&mut self) {
        match self {
            Self::EpsilonGreedy(inner) => inner.exploration_rate = 0.0,
            Self::Ucb1(inner) => inner.exploration_weight = 0.0,
            Self::Softmax(inner) => inner.greedy = true,
        }
    }

    #[must_use]
    pub const fn average(&self) -> &BanditAverage {
        match self {
            Self::EpsilonGreedy(inner) => &inner.average,
            Self::Ucb1(inner) => &inner.average,
            Self::Softmax(inner) => &inner.average,
        }
    }

    #[must_use]
    pub const fn arms(&self) -> usize {
        self.average().arms()
    }

    /// Arm with the best current estimate.
    #[must_use]
    pub fn greedy_arm(&self) -> usize {
        self.average().best_arm()
    }
}
