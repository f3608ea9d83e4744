//! Sparse per-arm reward estimates.

use std::collections::BTreeMap;
use std::fmt;

use crate::LearningError;
use crate::estimator::{Estimator, EstimatorKind};

/// Builds the estimator for an arm the first time it is observed.
pub type EstimatorFactory = Box<dyn Fn(usize) -> Estimator + Send + Sync>;

/// Holds one estimator per arm, created lazily on first observation.
///
/// Arms are dense indices `0..arms`. Unobserved arms read as `0.0` and cost no memory, which
/// keeps very large arm spaces (one arm per map cell) affordable.
pub struct BanditAverage {
    arms: usize,
    estimators: BTreeMap<usize, Estimator>,
    factory: EstimatorFactory,
}

impl fmt::Debug for BanditAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BanditAverage")
            .field("arms", &self.arms)
            .field("estimators", &self.estimators)
            .finish_non_exhaustive()
    }
}

impl BanditAverage {
    /// Every arm gets an estimator of the same kind.
    pub fn new(arms: usize, kind: EstimatorKind) -> Result<Self, LearningError> {
        kind.validate()?;
        Self::with_factory(arms, move |_| kind.instantiate())
    }

    /// Arms get whatever estimator `factory` returns for their index.
    pub fn with_factory<F>(arms: usize, factory: F) -> Result<Self, LearningError>
    where
        F: Fn(usize) -> Estimator + Send + Sync + 'static,
    {
        if arms == 0 {
            return Err(LearningError::InvalidConfig(
                "bandit needs at least one arm",
            ));
        }
        Ok(Self {
            arms,
            estimators: BTreeMap::new(),
            factory: Box::new(factory),
        })
    }

    #[must_use]
    pub const fn arms(&self) -> usize {
        self.arms
    }

    /// Fold `reward` into `arm`'s estimate, creating the estimator if needed.
    pub fn observe(&mut self, arm: usize, reward: f64) -> Result<(), LearningError> {
        if arm >= self.arms {
            return Err(LearningError::UnknownArm {
                arm,
                arms: self.arms,
            });
        }
        if !reward.is_finite() {
            return Err(LearningError::NonFiniteReward(reward));
        }
        let factory = &self.factory;
        self.estimators
            .entry(arm)
            .or_insert_with(|| factory(arm))
            .observe(reward);
        Ok(())
    }

    #[must_use]
    pub fn estimator(&self, arm: usize) -> Option<&Estimator> {
        self.estimators.get(&arm)
    }

    /// Current estimate for `arm`; `0.0` if it was never observed.
    #[must_use]
    pub fn average(&self, arm: usize) -> f64 {
        self.estimators.get(&arm).map_or(0.0, Estimator::value)
    }

    #[must_use]
    pub fn observations(&self, arm: usize) -> u64 {
        self.estimators.get(&arm).map_or(0, Estimator::observations)
    }

    #[must_use]
    pub fn total_observations(&self) -> u64 {
        self.estimators.values().map(Estimator::observations).sum()
    }

    /// Arms that hold an estimator.
    #[must_use]
    pub fn instantiated(&self) -> usize {
        self.estimators.len()
    }

    /// Arm with the highest estimate; the lowest index wins ties.
    #[must_use]
    pub fn best_arm(&self) -> usize {
        let mut best = 0;
        let mut best_value = self.average(0);
        for arm in 1..self.arms {
            let value = self.average(arm);
            if value > best_value {
                best = arm;
                best_value = value;
            }
        }
        best
    }
}
