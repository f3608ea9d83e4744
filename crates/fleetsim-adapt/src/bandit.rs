//! Adaptation driven by a bandit over a grouped discrete domain.

use std::hash::Hash;

use fleetsim_core::{
    BanditAlgorithm, BanditConfig, BanditKind, BanditSwitch, EstimatorKind, LearningError,
};
use rand::RngCore;
use tracing::trace;

use crate::PeerSnapshot;

/// Couples a [`BanditAlgorithm`] with a [`BanditSwitch`].
///
/// Each period the agent reports the domain index it played and the reward it earned; the
/// reward is credited to that index's group, friends' results are optionally credited too, and
/// the next index to play is the representative of the chosen arm.
#[derive(Debug)]
pub struct BanditAdaptation<G = usize> {
    bandit: BanditAlgorithm,
    switch: BanditSwitch<G>,
    peek_at_friends: bool,
}

impl<G: Clone + Eq + Hash> BanditAdaptation<G> {
    pub fn new(
        switch: BanditSwitch<G>,
        estimator: EstimatorKind,
        policy: BanditKind,
        peek_at_friends: bool,
    ) -> Result<Self, LearningError> {
        let bandit = BanditConfig {
            arms: switch.arms(),
            estimator,
            policy,
        }
        .build()?;
        Ok(Self {
            bandit,
            switch,
            peek_at_friends,
        })
    }

    #[must_use]
    pub const fn switch(&self) -> &BanditSwitch<G> {
        &self.switch
    }

    #[must_use]
    pub const fn bandit(&self) -> &BanditAlgorithm {
        &self.bandit
    }

    pub fn bandit_mut(&mut self) -> &mut BanditAlgorithm {
        &mut self.bandit
    }

    /// Credit `reward` to the group of `index`. Returns `false` if `index` has no arm.
    pub fn observe(&mut self, index: usize, reward: f64) -> Result<bool, LearningError> {
        let Some(arm) = self.switch.group_arm(index) else {
            return Ok(false);
        };
        self.bandit.observe_reward(reward, arm)?;
        Ok(true)
    }

    /// Domain index to play next.
    pub fn choose(&mut self, rng: &mut dyn RngCore) -> Result<usize, LearningError> {
        let arm = self.bandit.choose_arm(rng);
        self.switch
            .representative(arm)
            .ok_or(LearningError::UnknownArm {
                arm,
                arms: self.switch.arms(),
            })
    }

    /// Learn from the last period and pick the next index.
    ///
    /// Non-finite rewards, such as those of agents that have not completed a period yet, are
    /// not credited.
    pub fn adapt(
        &mut self,
        played: Option<usize>,
        reward: f64,
        peers: &[PeerSnapshot<usize>],
        rng: &mut dyn RngCore,
    ) -> Result<usize, LearningError> {
        if let Some(index) = played.filter(|_| reward.is_finite()) {
            self.observe(index, reward)?;
        }
        if self.peek_at_friends {
            for peer in peers.iter().filter(|peer| peer.fitness.is_finite()) {
                self.observe(peer.strategy, peer.fitness)?;
            }
        }
        let next = self.choose(rng)?;
        trace!(?played, reward, next, "bandit adaptation");
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsim_core::AgentId;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn blocks() -> BanditSwitch {
        BanditSwitch::new(12, |index| (index % 4 != 3).then_some(index / 4)).expect("switch")
    }

    #[test]
    fn rewards_credit_the_whole_group() {
        let mut adaptation = BanditAdaptation::new(
            blocks(),
            EstimatorKind::Iterative,
            BanditKind::EpsilonGreedy {
                exploration_rate: 0.0,
            },
            false,
        )
        .expect("adaptation");
        assert!(adaptation.observe(9, 5.0).expect("observe"));
        assert!(!adaptation.observe(7, 50.0).expect("observe"));

        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(adaptation.choose(&mut rng).expect("choose"), 8);
    }

    #[test]
    fn peeking_learns_from_friends() {
        let mut adaptation = BanditAdaptation::new(
            blocks(),
            EstimatorKind::Iterative,
            BanditKind::EpsilonGreedy {
                exploration_rate: 0.0,
            },
            true,
        )
        .expect("adaptation");
        let peers = [
            PeerSnapshot {
                id: AgentId::default(),
                strategy: 5,
                fitness: 30.0,
            },
            PeerSnapshot {
                id: AgentId::default(),
                strategy: 1,
                fitness: f64::NAN,
            },
        ];
        let mut rng = SmallRng::seed_from_u64(0);
        let next = adaptation
            .adapt(Some(0), 1.0, &peers, &mut rng)
            .expect("adapt");
        assert_eq!(next, 4);
        assert_eq!(adaptation.bandit().average().observations(0), 1);
        assert_eq!(adaptation.bandit().average().observations(1), 1);
    }

    #[test]
    fn unfinished_periods_are_not_credited() {
        let mut adaptation = BanditAdaptation::new(
            blocks(),
            EstimatorKind::Iterative,
            BanditKind::Ucb1 {
                min_reward: 0.0,
                max_reward: 10.0,
            },
            false,
        )
        .expect("adaptation");
        let mut rng = SmallRng::seed_from_u64(0);
        let next = adaptation
            .adapt(None, f64::NAN, &[], &mut rng)
            .expect("adapt");
        assert_eq!(next, 0);
        assert_eq!(adaptation.bandit().average().total_observations(), 0);
    }
}
