//! Strategy adaptation for fleetsim agents.
//!
//! An [`ExploreImitateAdaptation`] controller runs one tick per adaptation opportunity: it
//! reads the agent's fitness and current strategy through an [`AdaptationHost`], picks one of
//! explore, imitate or exploit according to an [`AdaptationProbability`], delegates the move
//! to an [`AdaptationAlgorithm`] and writes any change back through the host.
//!
//! [`AdaptationProbability`]: fleetsim_core::AdaptationProbability

use fleetsim_core::{AgentId, SocialNetwork};
use rand::RngCore;
use serde::{Deserialize, Serialize};

pub mod bandit;
pub mod beam;
pub mod controller;
pub mod step;

pub use bandit::BanditAdaptation;
pub use beam::{BeamHillClimbing, BeamHillClimbingConfig, Perturbation, Scorer};
pub use controller::{AdaptationCounters, AdaptationOutcome, Branch, ExploreImitateAdaptation};
pub use step::{jitter_step, menu_step};

/// The simulation side of an adaptation: objective, sensor, actuator and eligibility.
pub trait AdaptationHost<T> {
    /// Current performance of `agent`. Higher is better.
    fn fitness(&self, agent: AgentId) -> f64;

    /// Strategy `agent` currently holds.
    fn scan(&self, agent: AgentId) -> T;

    /// Install a new strategy. Only called when it differs from the scanned one.
    fn apply(&mut self, agent: AgentId, strategy: T);

    /// Agents that are not ready sit the tick out.
    fn is_ready(&self, _agent: AgentId) -> bool {
        true
    }

    /// Whether `agent` may copy `peer`.
    fn is_eligible_peer(&self, _agent: AgentId, _peer: AgentId) -> bool {
        true
    }
}

/// A friend's strategy and fitness, frozen for the duration of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerSnapshot<T> {
    pub id: AgentId,
    pub strategy: T,
    pub fitness: f64,
}

/// Result of an imitation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Imitation<T> {
    /// Strategy to adopt, `None` to stay put.
    pub decision: Option<T>,
    /// Peer whose strategy was copied.
    pub copied_from: Option<AgentId>,
}

impl<T> Imitation<T> {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            decision: None,
            copied_from: None,
        }
    }

    #[must_use]
    pub fn copied(strategy: T, peer: AgentId) -> Self {
        Self {
            decision: Some(strategy),
            copied_from: Some(peer),
        }
    }
}

/// Compares the outcome of last tick's move with the state it started from.
#[derive(Debug, Clone, Copy)]
pub struct MoveReview<'a, T> {
    pub agent: AgentId,
    pub previous: &'a T,
    pub previous_fitness: f64,
    pub current: &'a T,
    pub current_fitness: f64,
}

impl<T> MoveReview<'_, T> {
    /// Fitness lost since the move; negative when the move paid off.
    #[must_use]
    pub fn fitness_drop(&self) -> f64 {
        self.previous_fitness - self.current_fitness
    }
}

/// The three primitive moves plus optional judgement of the previous one.
///
/// Returning `None` from a move means "no change".
pub trait AdaptationAlgorithm<T> {
    /// Propose a new strategy irrespective of peers.
    fn randomize(&mut self, rng: &mut dyn RngCore, agent: AgentId, current: &T) -> Option<T>;

    /// Copy a better peer, if any. May rewire `network`.
    fn imitate(
        &mut self,
        rng: &mut dyn RngCore,
        agent: AgentId,
        fitness: f64,
        current: &T,
        peers: &[PeerSnapshot<T>],
        network: &mut SocialNetwork,
    ) -> Imitation<T>;

    /// Refine the current strategy without looking at peers.
    fn exploit(
        &mut self,
        rng: &mut dyn RngCore,
        agent: AgentId,
        fitness: f64,
        current: &T,
    ) -> Option<T>;

    /// Called on the tick after an exploration. `Some` replaces the current strategy.
    fn judge_randomization(
        &mut self,
        _review: &MoveReview<'_, T>,
        _rng: &mut dyn RngCore,
    ) -> Option<T> {
        None
    }

    /// Called on the tick after a successful imitation of `peer`.
    fn judge_imitation(
        &mut self,
        _review: &MoveReview<'_, T>,
        _peer: AgentId,
        _network: &mut SocialNetwork,
        _rng: &mut dyn RngCore,
    ) -> Option<T> {
        None
    }
}
