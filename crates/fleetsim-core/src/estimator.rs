//! Running estimates of a single arm's value from a stream of rewards.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::LearningError;

/// Selects the estimator each arm is given when it is first observed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorKind {
    /// Exact running mean.
    #[default]
    Iterative,
    /// Exponentially weighted mean; `decay` is the weight kept by the previous value.
    Exponential { decay: f64 },
    /// Arithmetic mean of the last `window` rewards.
    Windowed { window: usize },
}

impl EstimatorKind {
    /// Checks the parameters of the selected estimator.
    pub fn validate(&self) -> Result<(), LearningError> {
        match *self {
            Self::Iterative => Ok(()),
            Self::Exponential { decay } => {
                if decay > 0.0 && decay < 1.0 {
                    Ok(())
                } else {
                    Err(LearningError::InvalidConfig(
                        "exponential decay must lie in (0, 1)",
                    ))
                }
            }
            Self::Windowed { window } => {
                if window == 0 {
                    Err(LearningError::InvalidConfig(
                        "window size must be at least 1",
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Validate and construct a fresh estimator.
    pub fn build(&self) -> Result<Estimator, LearningError> {
        self.validate()?;
        Ok(self.instantiate())
    }

    /// Construct without validation; callers must have validated `self` already.
    pub(crate) fn instantiate(&self) -> Estimator {
        match *self {
            Self::Iterative => Estimator::Iterative(IterativeAverage::default()),
            Self::Exponential { decay } => Estimator::Exponential(ExponentialAverage {
                value: 0.0,
                decay,
                count: 0,
            }),
            Self::Windowed { window } => Estimator::Windowed(WindowedAverage {
                window,
                samples: VecDeque::with_capacity(window),
                count: 0,
            }),
        }
    }
}

/// Exact running mean. Constant memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IterativeAverage {
    value: f64,
    count: u64,
}

impl IterativeAverage {
    pub fn observe(&mut self, reward: f64) {
        self.count += 1;
        self.value += (reward - self.value) / self.count as f64;
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
}

/// Exponentially weighted moving average.
///
/// The first reward seeds the estimate; afterwards `value = decay * value + (1 - decay) * reward`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExponentialAverage {
    value: f64,
    decay: f64,
    count: u64,
}

impl ExponentialAverage {
    pub fn new(decay: f64) -> Result<Self, LearningError> {
        EstimatorKind::Exponential { decay }.validate()?;
        Ok(Self {
            value: 0.0,
            decay,
            count: 0,
        })
    }

    pub fn observe(&mut self, reward: f64) {
        if self.count == 0 {
            self.value = reward;
        } else {
            self.value = self.decay * self.value + (1.0 - self.decay) * reward;
        }
        self.count += 1;
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    #[must_use]
    pub const fn decay(&self) -> f64 {
        self.decay
    }
}

/// Sliding-window mean over the most recent `window` rewards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowedAverage {
    window: usize,
    samples: VecDeque<f64>,
    count: u64,
}

impl WindowedAverage {
    pub fn new(window: usize) -> Result<Self, LearningError> {
        EstimatorKind::Windowed { window }.validate()?;
        Ok(Self {
            window,
            samples: VecDeque::with_capacity(window),
            count: 0,
        })
    }

    pub fn observe(&mut self, reward: f64) {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(reward);
        self.count += 1;
    }

    /// Mean of the retained rewards, `0.0` before the first one.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Rewards currently inside the window, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

/// One arm's running value estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Estimator {
    Iterative(IterativeAverage),
    Exponential(ExponentialAverage),
    Windowed(WindowedAverage),
}

impl Estimator {
    /// Fold a new reward into the estimate.
    pub fn observe(&mut self, reward: f64) {
        match self {
            Self::Iterative(inner) => inner.observe(reward),
            Self::Exponential(inner) => inner.observe(reward),
            Self::Windowed(inner) => inner.observe(reward),
        }
    }

    /// Current estimate; `0.0` before any reward has been observed.
    #[must_use]
    pub fn value(&self) -> f64 {
        match self {
            Self::Iterative(inner) => inner.value(),
            Self::Exponential(inner) => inner.value(),
            Self::Windowed(inner) => inner.value(),
        }
    }

    /// Number of rewards observed over the estimator's lifetime.
    #[must_use]
    pub const fn observations(&self) -> u64 {
        match self {
            Self::Iterative(inner) => inner.count,
            Self::Exponential(inner) => inner.count,
            Self::Windowed(inner) => inner.count,
        }
    }
}
