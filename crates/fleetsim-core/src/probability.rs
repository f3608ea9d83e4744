//! Per-agent explore/imitate probabilities and the policies that anneal them.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{LearningError, check_probability};

/// Performance summary of one completed economic period, such as a fishing trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub profit_per_hour: f64,
    /// Rolling population average of profit per hour, used by social annealing.
    pub population_average: f64,
}

/// Selects and parameterises an [`AdaptationProbability`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbabilityConfig {
    Fixed {
        exploration: f64,
        imitation: f64,
    },
    /// Explore with certainty whenever profit per hour is at or below `threshold`.
    Threshold { threshold: f64, imitation: f64 },
    /// Explore with certainty whenever profit per hour is at or below
    /// `multiplier * population_average`.
    SocialAnnealing { multiplier: f64, imitation: f64 },
    /// Shrink exploration after bad explorations, grow it after good ones.
    ExplorationPenalty {
        exploration: f64,
        imitation: f64,
        penalty: f64,
        minimum: f64,
    },
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self::Fixed {
            exploration: 0.2,
            imitation: 0.6,
        }
    }
}

impl ProbabilityConfig {
    pub fn build(&self) -> Result<AdaptationProbability, LearningError> {
        match *self {
            Self::Fixed {
                exploration,
                imitation,
            } => AdaptationProbability::fixed(exploration, imitation),
            Self::Threshold {
                threshold,
                imitation,
            } => AdaptationProbability::threshold(threshold, imitation),
            Self::SocialAnnealing {
                multiplier,
                imitation,
            } => AdaptationProbability::social_annealing(multiplier, imitation),
            Self::ExplorationPenalty {
                exploration,
                imitation,
                penalty,
                minimum,
            } => {
                AdaptationProbability::exploration_penalty(exploration, imitation, penalty, minimum)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
enum Policy {
    Fixed,
    Threshold { threshold: f64 },
    SocialAnnealing { multiplier: f64 },
    ExplorationPenalty { penalty: f64, minimum: f64 },
}

/// Explore and imitate probabilities for one agent.
///
/// Owned per agent and mutated in place; never share one instance between agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationProbability {
    exploration: f64,
    imitation: f64,
    policy: Policy,
}

impl AdaptationProbability {
    pub fn fixed(exploration: f64, imitation: f64) -> Result<Self, LearningError> {
        Ok(Self {
            exploration: check_probability("exploration probability", exploration)?,
            imitation: check_probability("imitation probability", imitation)?,
            policy: Policy::Fixed,
        })
    }

    /// Starts at zero exploration until the first period is reported.
    pub fn threshold(threshold: f64, imitation: f64) -> Result<Self, LearningError> {
        if !threshold.is_finite() {
            return Err(LearningError::InvalidConfig(
                "exploration threshold must be finite",
            ));
        }
        Ok(Self {
            exploration: 0.0,
            imitation: check_probability("imitation probability", imitation)?,
            policy: Policy::Threshold { threshold },
        })
    }

    /// Starts at zero exploration until the first period is reported.
    pub fn social_annealing(multiplier: f64, imitation: f64) -> Result<Self, LearningError> {
        if !multiplier.is_finite() {
            return Err(LearningError::InvalidConfig(
                "social annealing multiplier must be finite",
            ));
        }
        Ok(Self {
            exploration: 0.0,
            imitation: check_probability("imitation probability", imitation)?,
            policy: Policy::SocialAnnealing { multiplier },
        })
    }

    pub fn exploration_penalty(
        exploration: f64,
        imitation: f64,
        penalty: f64,
        minimum: f64,
    ) -> Result<Self, LearningError> {
        check_probability("exploration penalty", penalty)?;
        check_probability("minimum exploration probability", minimum)?;
        if exploration < minimum {
            return Err(LearningError::InvalidConfig(
                "initial exploration probability is below its minimum",
            ));
        }
        Ok(Self {
            exploration: check_probability("exploration probability", exploration)?,
            imitation: check_probability("imitation probability", imitation)?,
            policy: Policy::ExplorationPenalty { penalty, minimum },
        })
    }

    #[must_use]
    pub const fn exploration_probability(&self) -> f64 {
        self.exploration
    }

    #[must_use]
    pub const fn imitation_probability(&self) -> f64 {
        self.imitation
    }

    pub fn set_exploration_probability(&mut self, value: f64) -> Result<(), LearningError> {
        self.exploration = check_probability("exploration probability", value)?;
        Ok(())
    }

    pub fn set_imitation_probability(&mut self, value: f64) -> Result<(), LearningError> {
        self.imitation = check_probability("imitation probability", value)?;
        Ok(())
    }

    /// Recompute exploration after a completed period. Only the threshold policies react.
    pub fn on_period_end(&mut self, report: &PeriodReport) {
        let reference = match self.policy {
            Policy::Threshold { threshold } => threshold,
            Policy::SocialAnnealing { multiplier } => report.population_average * multiplier,
            Policy::Fixed | Policy::ExplorationPenalty { .. } => return,
        };
        if !(report.profit_per_hour.is_finite() && reference.is_finite()) {
            warn!(
                profit_per_hour = report.profit_per_hour,
                reference, "ignoring non-finite period report"
            );
            return;
        }
        self.exploration = if report.profit_per_hour <= reference {
            1.0
        } else {
            0.0
        };
    }

    /// Feedback on the exploration started last tick. Only the penalty policy reacts.
    pub fn judge_exploration(&mut self, previous_fitness: f64, current_fitness: f64) {
        let Policy::ExplorationPenalty { penalty, minimum } = self.policy else {
            return;
        };
        if !(previous_fitness.is_finite() && current_fitness.is_finite()) {
            return;
        }
        self.exploration = if current_fitness < previous_fitness {
            (self.exploration * (1.0 - penalty)).max(minimum)
        } else {
            (self.exploration * (1.0 + penalty)).min(1.0)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(profit_per_hour: f64, population_average: f64) -> PeriodReport {
        PeriodReport {
            profit_per_hour,
            population_average,
        }
    }

    #[test]
    fn threshold_explores_at_or_below_threshold() {
        let mut probability = AdaptationProbability::threshold(10.0, 0.5).expect("threshold");
        assert_eq!(probability.exploration_probability(), 0.0);

        probability.on_period_end(&report(10.0, 0.0));
        assert_eq!(probability.exploration_probability(), 1.0);
        probability.on_period_end(&report(10.5, 0.0));
        assert_eq!(probability.exploration_probability(), 0.0);
        probability.on_period_end(&report(-3.0, 0.0));
        assert_eq!(probability.exploration_probability(), 1.0);
        assert_eq!(probability.imitation_probability(), 0.5);
    }

    #[test]
    fn social_annealing_boundary_moves_with_multiplier() {
        let average = 40.0;
        for multiplier in [0.5, 1.0, 2.0] {
            let mut probability =
                AdaptationProbability::social_annealing(multiplier, 0.0).expect("annealing");
            probability.on_period_end(&report(multiplier * average, average));
            assert_eq!(probability.exploration_probability(), 1.0, "m={multiplier}");
            probability.on_period_end(&report(multiplier * average * 1.5, average));
            assert_eq!(probability.exploration_probability(), 0.0, "m={multiplier}");
        }
    }

    #[test]
    fn non_finite_reports_leave_probability_unchanged() {
        let mut probability =
            AdaptationProbability::social_annealing(1.0, 0.0).expect("annealing");
        probability.on_period_end(&report(1.0, 5.0));
        assert_eq!(probability.exploration_probability(), 1.0);
        probability.on_period_end(&report(f64::NAN, 5.0));
        probability.on_period_end(&report(100.0, f64::INFINITY));
        assert_eq!(probability.exploration_probability(), 1.0);
    }

    #[test]
    fn fixed_ignores_feedback() {
        let mut probability = AdaptationProbability::fixed(0.3, 0.4).expect("fixed");
        probability.on_period_end(&report(-100.0, 100.0));
        probability.judge_exploration(100.0, -100.0);
        assert_eq!(probability.exploration_probability(), 0.3);
        assert_eq!(probability.imitation_probability(), 0.4);
    }

    #[test]
    fn penalty_shrinks_to_floor_and_grows_to_one() {
        let mut probability =
            AdaptationProbability::exploration_penalty(0.2, 1.0, 0.5, 0.05).expect("penalty");
        probability.judge_exploration(10.0, 5.0);
        assert!((probability.exploration_probability() - 0.1).abs() < 1e-12);
        probability.judge_exploration(10.0, 5.0);
        probability.judge_exploration(10.0, 5.0);
        assert!((probability.exploration_probability() - 0.05).abs() < 1e-12);

        for _ in 0..20 {
            probability.judge_exploration(5.0, 5.0);
        }
        assert_eq!(probability.exploration_probability(), 1.0);
    }

    #[test]
    fn out_of_range_probabilities_are_rejected() {
        assert!(AdaptationProbability::fixed(1.2, 0.0).is_err());
        assert!(AdaptationProbability::fixed(0.0, -0.1).is_err());
        assert!(AdaptationProbability::threshold(f64::NAN, 0.5).is_err());
        assert!(AdaptationProbability::exploration_penalty(0.01, 0.5, 0.1, 0.05).is_err());
        let mut probability = AdaptationProbability::fixed(0.0, 0.0).expect("fixed");
        assert!(probability.set_exploration_probability(2.0).is_err());
        assert_eq!(probability.exploration_probability(), 0.0);
    }

    #[test]
    fn config_selects_policy() {
        let config: ProbabilityConfig =
            serde_json::from_str(r#"{"kind":"threshold","threshold":3.5,"imitation":0.25}"#)
                .expect("parse");
        let probability = config.build().expect("build");
        assert_eq!(
            probability,
            AdaptationProbability::threshold(3.5, 0.25).expect("threshold")
        );
    }
}
