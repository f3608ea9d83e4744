//! Beam hill climbing: the default [`AdaptationAlgorithm`].

use std::cmp::Reverse;
use std::fmt;

use fleetsim_core::{AgentId, LearningError, SocialNetwork};
use ordered_float::OrderedFloat;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AdaptationAlgorithm, Imitation, MoveReview, PeerSnapshot};

/// Proposes a new strategy from the current one; `None` when no proposal exists.
pub type Perturbation<T> = Box<dyn FnMut(&mut dyn RngCore, AgentId, &T) -> Option<T> + Send>;

/// Scores a candidate strategy for the beam exploit. Higher is better.
pub type Scorer<T> = Box<dyn FnMut(AgentId, &T) -> f64 + Send>;

/// Serializable knobs of [`BeamHillClimbing`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamHillClimbingConfig {
    /// Copy the best better peer; otherwise copy a random better peer.
    pub always_copy_best: bool,
    /// Return to the pre-exploration strategy when exploring lowered fitness.
    pub backtracks_on_bad_exploration: bool,
    /// Fitness drop after an imitation that ends the friendship. `None` keeps the network static.
    pub unfriend_threshold: Option<f64>,
}

impl Default for BeamHillClimbingConfig {
    fn default() -> Self {
        Self {
            always_copy_best: true,
            backtracks_on_bad_exploration: true,
            unfriend_threshold: None,
        }
    }
}

impl BeamHillClimbingConfig {
    pub fn validate(&self) -> Result<(), LearningError> {
        match self.unfriend_threshold {
            Some(threshold) if !(threshold.is_finite() && threshold > 0.0) => Err(
                LearningError::InvalidConfig("unfriend threshold must be finite and positive"),
            ),
            _ => Ok(()),
        }
    }
}

struct Beam<T> {
    width: usize,
    scorer: Scorer<T>,
}

/// Explores by perturbation, imitates the best better peer and, with a beam, exploits by
/// keeping the best of several scored perturbations.
pub struct BeamHillClimbing<T> {
    perturb: Perturbation<T>,
    config: BeamHillClimbingConfig,
    beam: Option<Beam<T>>,
}

impl<T> fmt::Debug for BeamHillClimbing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeamHillClimbing")
            .field("config", &self.config)
            .field("beam_width", &self.beam.as_ref().map(|beam| beam.width))
            .finish_non_exhaustive()
    }
}

impl<T> BeamHillClimbing<T> {
    pub fn new(perturb: Perturbation<T>) -> Self {
        Self {
            perturb,
            config: BeamHillClimbingConfig::default(),
            beam: None,
        }
    }

    pub fn from_config(
        config: BeamHillClimbingConfig,
        perturb: Perturbation<T>,
    ) -> Result<Self, LearningError> {
        config.validate()?;
        Ok(Self {
            perturb,
            config,
            beam: None,
        })
    }

    /// Exploit by scoring `width` perturbations with `scorer`.
    pub fn with_beam(mut self, width: usize, scorer: Scorer<T>) -> Result<Self, LearningError> {
        if width == 0 {
            return Err(LearningError::InvalidConfig("beam width must be at least 1"));
        }
        self.beam = Some(Beam { width, scorer });
        Ok(self)
    }

    #[must_use]
    pub const fn config(&self) -> &BeamHillClimbingConfig {
        &self.config
    }
}

impl<T: Clone> AdaptationAlgorithm<T> for BeamHillClimbing<T> {
    fn randomize(&mut self, rng: &mut dyn RngCore, agent: AgentId, current: &T) -> Option<T> {
        (self.perturb)(rng, agent, current)
    }

    fn imitate(
        &mut self,
        rng: &mut dyn RngCore,
        _agent: AgentId,
        fitness: f64,
        _current: &T,
        peers: &[PeerSnapshot<T>],
        _network: &mut SocialNetwork,
    ) -> Imitation<T> {
        let better: Vec<&PeerSnapshot<T>> = peers
            .iter()
            .filter(|peer| peer.fitness.is_finite() && peer.fitness > fitness)
            .collect();
        let chosen = if self.config.always_copy_best {
            better
                .iter()
                .copied()
                .min_by_key(|peer| Reverse(OrderedFloat(peer.fitness)))
        } else if better.is_empty() {
            None
        } else {
            Some(better[rng.random_range(0..better.len())])
        };
        match chosen {
            Some(peer) => Imitation::copied(peer.strategy.clone(), peer.id),
            None => Imitation::none(),
        }
    }

    fn exploit(
        &mut self,
        rng: &mut dyn RngCore,
        agent: AgentId,
        _fitness: f64,
        current: &T,
    ) -> Option<T> {
        let beam = self.beam.as_mut()?;
        let mut incumbent = (beam.scorer)(agent, current);
        if incumbent.is_nan() {
            incumbent = f64::NEG_INFINITY;
        }
        let mut best: Option<(T, f64)> = None;
        for _ in 0..beam.width {
            let Some(candidate) = (self.perturb)(rng, agent, current) else {
                continue;
            };
            let score = (beam.scorer)(agent, &candidate);
            if !score.is_finite() {
                continue;
            }
            if best.as_ref().is_none_or(|(_, top)| score > *top) {
                best = Some((candidate, score));
            }
        }
        best.filter(|(_, score)| *score > incumbent)
            .map(|(candidate, _)| candidate)
    }

    fn judge_randomization(
        &mut self,
        review: &MoveReview<'_, T>,
        _rng: &mut dyn RngCore,
    ) -> Option<T> {
        let worse = review.current_fitness < review.previous_fitness;
        (self.config.backtracks_on_bad_exploration && worse).then(|| review.previous.clone())
    }

    fn judge_imitation(
        &mut self,
        review: &MoveReview<'_, T>,
        peer: AgentId,
        network: &mut SocialNetwork,
        rng: &mut dyn RngCore,
    ) -> Option<T> {
        let threshold = self.config.unfriend_threshold?;
        if review.fitness_drop() > threshold {
            let replacement = network.rewire(review.agent, peer, rng);
            debug!(
                agent = ?review.agent,
                ?peer,
                ?replacement,
                drop = review.fitness_drop(),
                "unfriended after bad imitation"
            );
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<AgentId> {
        let mut agents = SlotMap::<AgentId, ()>::with_key();
        (0..n).map(|_| agents.insert(())).collect()
    }

    fn increment() -> Perturbation<i32> {
        Box::new(|_rng: &mut dyn RngCore, _agent: AgentId, current: &i32| Some(current + 1))
    }

    fn peers(agents: &[AgentId], fitness: &[f64]) -> Vec<PeerSnapshot<i32>> {
        agents
            .iter()
            .zip(fitness)
            .enumerate()
            .map(|(index, (&id, &fitness))| PeerSnapshot {
                id,
                strategy: index as i32 * 10,
                fitness,
            })
            .collect()
    }

    #[test]
    fn imitate_copies_best_strictly_better_peer() {
        let agents = ids(4);
        let mut algorithm = BeamHillClimbing::new(increment());
        let mut rng = SmallRng::seed_from_u64(0);
        let mut network = SocialNetwork::new();
        let snapshot = peers(&agents[1..], &[100.0, 10.0, 100.0]);

        let imitation = algorithm.imitate(&mut rng, agents[0], 0.0, &5, &snapshot, &mut network);
        assert_eq!(imitation, Imitation::copied(0, agents[1]));

        let imitation =
            algorithm.imitate(&mut rng, agents[0], 1_000.0, &5, &snapshot, &mut network);
        assert_eq!(imitation, Imitation::none());

        let imitation = algorithm.imitate(&mut rng, agents[0], 100.0, &5, &snapshot, &mut network);
        assert_eq!(imitation, Imitation::none());
    }

    #[test]
    fn random_imitation_picks_among_better_peers_only() {
        let agents = ids(4);
        let config = BeamHillClimbingConfig {
            always_copy_best: false,
            ..BeamHillClimbingConfig::default()
        };
        let mut algorithm =
            BeamHillClimbing::from_config(config, increment()).expect("algorithm");
        let mut rng = SmallRng::seed_from_u64(1);
        let mut network = SocialNetwork::new();
        let snapshot = peers(&agents[1..], &[50.0, -5.0, f64::NAN]);
        for _ in 0..20 {
            let imitation =
                algorithm.imitate(&mut rng, agents[0], 0.0, &5, &snapshot, &mut network);
            assert_eq!(imitation.copied_from, Some(agents[1]));
        }
    }

    #[test]
    fn exploit_without_beam_stays_put() {
        let mut algorithm = BeamHillClimbing::new(increment());
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(algorithm.exploit(&mut rng, AgentId::default(), 1.0, &3), None);
        assert_eq!(algorithm.randomize(&mut rng, AgentId::default(), &3), Some(4));
    }

    #[test]
    fn beam_exploit_moves_only_to_strict_improvements() {
        let mut rng = SmallRng::seed_from_u64(0);
        let jitter: Perturbation<i32> =
            Box::new(|rng: &mut dyn RngCore, _agent: AgentId, current: &i32| {
                Some(current + rng.random_range(-3..=3))
            });
        let scorer: Scorer<i32> =
            Box::new(|_agent: AgentId, value: &i32| -f64::from((value - 10).abs()));
        let mut algorithm = BeamHillClimbing::new(jitter)
            .with_beam(16, scorer)
            .expect("beam");

        let mut value = 0;
        for _ in 0..20 {
            if let Some(next) = algorithm.exploit(&mut rng, AgentId::default(), 0.0, &value) {
                assert!((next - 10).abs() < (value - 10).abs());
                value = next;
            }
        }
        assert_eq!(value, 10);
        assert_eq!(algorithm.exploit(&mut rng, AgentId::default(), 0.0, &10), None);
        assert!(
            BeamHillClimbing::new(increment())
                .with_beam(0, Box::new(|_: AgentId, _: &i32| 0.0))
                .is_err()
        );
    }

    #[test]
    fn bad_exploration_backtracks() {
        let mut algorithm = BeamHillClimbing::new(increment());
        let mut rng = SmallRng::seed_from_u64(0);
        let review = MoveReview {
            agent: AgentId::default(),
            previous: &1,
            previous_fitness: 10.0,
            current: &2,
            current_fitness: 5.0,
        };
        assert_eq!(algorithm.judge_randomization(&review, &mut rng), Some(1));

        let good = MoveReview {
            current_fitness: 10.0,
            ..review
        };
        assert_eq!(algorithm.judge_randomization(&good, &mut rng), None);

        let config = BeamHillClimbingConfig {
            backtracks_on_bad_exploration: false,
            ..BeamHillClimbingConfig::default()
        };
        let mut stubborn = BeamHillClimbing::from_config(config, increment()).expect("algorithm");
        assert_eq!(stubborn.judge_randomization(&review, &mut rng), None);
    }

    #[test]
    fn dynamic_network_drops_disappointing_friend() {
        let agents = ids(3);
        let mut network = SocialNetwork::new();
        network.befriend(agents[0], agents[1]);
        network.add_agent(agents[2]);
        let config = BeamHillClimbingConfig {
            unfriend_threshold: Some(5.0),
            ..BeamHillClimbingConfig::default()
        };
        let mut algorithm = BeamHillClimbing::from_config(config, increment()).expect("algorithm");
        let mut rng = SmallRng::seed_from_u64(0);

        let mild = MoveReview {
            agent: agents[0],
            previous: &0,
            previous_fitness: 10.0,
            current: &1,
            current_fitness: 7.0,
        };
        algorithm.judge_imitation(&mild, agents[1], &mut network, &mut rng);
        assert!(network.is_friend(agents[0], agents[1]));

        let severe = MoveReview {
            current_fitness: 1.0,
            ..mild
        };
        algorithm.judge_imitation(&severe, agents[1], &mut network, &mut rng);
        assert!(!network.is_friend(agents[0], agents[1]));
        assert!(network.is_friend(agents[0], agents[2]));
    }

    #[test]
    fn config_rejects_non_positive_unfriend_threshold() {
        let config = BeamHillClimbingConfig {
            unfriend_threshold: Some(0.0),
            ..BeamHillClimbingConfig::default()
        };
        assert!(BeamHillClimbing::from_config(config, increment()).is_err());
        let parsed: BeamHillClimbingConfig =
            serde_json::from_str(r#"{"always_copy_best":false}"#).expect("parse");
        assert!(!parsed.always_copy_best);
        assert!(parsed.backtracks_on_bad_exploration);
    }
}
