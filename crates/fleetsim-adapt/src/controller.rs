//! The explore-imitate-exploit controller.

use fleetsim_core::{AdaptationProbability, AgentId, SocialNetwork};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AdaptationAlgorithm, AdaptationHost, MoveReview, PeerSnapshot};

/// Which branch a tick took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    /// The host reported the agent as not ready.
    Skipped,
    Explored,
    Imitated,
    Exploited,
}

/// Running tally of branches taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationCounters {
    pub explored: u64,
    pub imitated: u64,
    pub exploited: u64,
    pub skipped: u64,
}

impl AdaptationCounters {
    pub fn record(&mut self, branch: Branch) {
        match branch {
            Branch::Skipped => self.skipped += 1,
            Branch::Explored => self.explored += 1,
            Branch::Imitated => self.imitated += 1,
            Branch::Exploited => self.exploited += 1,
        }
    }

    /// Ticks that reached a branch decision.
    #[must_use]
    pub const fn active(&self) -> u64 {
        self.explored + self.imitated + self.exploited
    }

    pub fn merge(&mut self, other: &Self) {
        self.explored += other.explored;
        self.imitated += other.imitated;
        self.exploited += other.exploited;
        self.skipped += other.skipped;
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationOutcome<T> {
    pub branch: Branch,
    /// Strategy handed to the host, if it changed.
    pub applied: Option<T>,
    /// Peer copied by a successful imitation.
    pub copied_from: Option<AgentId>,
    /// The previous move was judged bad and undone.
    pub reverted: bool,
}

impl<T> AdaptationOutcome<T> {
    const fn skipped() -> Self {
        Self {
            branch: Branch::Skipped,
            applied: None,
            copied_from: None,
            reverted: false,
        }
    }
}

#[derive(Debug, Clone)]
struct ImitationStart<T> {
    peer: AgentId,
    strategy: T,
    fitness: f64,
}

/// Per-agent controller. Owns the agent's probability and the memory of its last move.
#[derive(Debug)]
pub struct ExploreImitateAdaptation<T, A> {
    algorithm: A,
    probability: AdaptationProbability,
    exploration_start: Option<(T, f64)>,
    imitation_start: Option<ImitationStart<T>>,
    counters: AdaptationCounters,
}

impl<T, A> ExploreImitateAdaptation<T, A>
where
    T: Clone + PartialEq,
    A: AdaptationAlgorithm<T>,
{
    pub fn new(algorithm: A, probability: AdaptationProbability) -> Self {
        Self {
            algorithm,
            probability,
            exploration_start: None,
            imitation_start: None,
            counters: AdaptationCounters::default(),
        }
    }

    #[must_use]
    pub const fn probability(&self) -> &AdaptationProbability {
        &self.probability
    }

    /// Period-end feedback goes through here.
    pub fn probability_mut(&mut self) -> &mut AdaptationProbability {
        &mut self.probability
    }

    #[must_use]
    pub const fn counters(&self) -> &AdaptationCounters {
        &self.counters
    }

    pub fn algorithm_mut(&mut self) -> &mut A {
        &mut self.algorithm
    }

    /// Run one adaptation tick for `agent`.
    ///
    /// Exploration is drawn first, then imitation (only when an eligible friend exists),
    /// otherwise the agent exploits. A draw is only consumed when its probability is positive.
    pub fn adapt<H>(
        &mut self,
        agent: AgentId,
        host: &mut H,
        network: &mut SocialNetwork,
        rng: &mut dyn RngCore,
    ) -> AdaptationOutcome<T>
    where
        H: AdaptationHost<T>,
    {
        if !host.is_ready(agent) {
            self.counters.record(Branch::Skipped);
            debug!(?agent, "agent not ready, skipping adaptation");
            return AdaptationOutcome::skipped();
        }

        let mut fitness = host.fitness(agent);
        let scanned = host.scan(agent);
        let mut current = scanned.clone();
        let mut reverted = false;

        if let Some((previous, previous_fitness)) = self.exploration_start.take() {
            let review = MoveReview {
                agent,
                previous: &previous,
                previous_fitness,
                current: &current,
                current_fitness: fitness,
            };
            let judged = self.algorithm.judge_randomization(&review, rng);
            self.probability.judge_exploration(previous_fitness, fitness);
            if let Some(back) = judged {
                if back == previous {
                    fitness = previous_fitness;
                }
                current = back;
                reverted = true;
            }
        } else if let Some(start) = self.imitation_start.take() {
            let review = MoveReview {
                agent,
                previous: &start.strategy,
                previous_fitness: start.fitness,
                current: &current,
                current_fitness: fitness,
            };
            if let Some(back) = self
                .algorithm
                .judge_imitation(&review, start.peer, network, rng)
            {
                if back == start.strategy {
                    fitness = start.fitness;
                }
                current = back;
                reverted = true;
            }
        }

        let mut copied_from = None;
        let exploration = self.probability.exploration_probability();
        let (branch, decision) = if exploration > 0.0 && rng.random_bool(exploration) {
            let decision = self.algorithm.randomize(rng, agent, &current);
            self.exploration_start = Some((current.clone(), fitness));
            (Branch::Explored, decision)
        } else {
            let imitation = self.probability.imitation_probability();
            let peers = if imitation > 0.0 {
                eligible_peers(agent, host, network)
            } else {
                Vec::new()
            };
            if !peers.is_empty() && rng.random_bool(imitation) {
                let result = self
                    .algorithm
                    .imitate(rng, agent, fitness, &current, &peers, network);
                if let Some(peer) = result.copied_from {
                    self.imitation_start = Some(ImitationStart {
                        peer,
                        strategy: current.clone(),
                        fitness,
                    });
                    copied_from = Some(peer);
                }
                (Branch::Imitated, result.decision)
            } else {
                let decision = self.algorithm.exploit(rng, agent, fitness, &current);
                (Branch::Exploited, decision)
            }
        };

        let target = decision.or_else(|| reverted.then(|| current.clone()));
        let applied = match target {
            Some(strategy) if strategy != scanned => {
                host.apply(agent, strategy.clone());
                Some(strategy)
            }
            _ => None,
        };

        self.counters.record(branch);
        debug!(
            ?agent,
            ?branch,
            fitness,
            applied = applied.is_some(),
            reverted,
            "adaptation tick"
        );
        AdaptationOutcome {
            branch,
            applied,
            copied_from,
            reverted,
        }
    }
}

fn eligible_peers<T, H>(
    agent: AgentId,
    host: &H,
    network: &SocialNetwork,
) -> Vec<PeerSnapshot<T>>
where
    H: AdaptationHost<T>,
{
    network
        .friends(agent)
        .iter()
        .copied()
        .filter(|&peer| host.is_eligible_peer(agent, peer))
        .map(|peer| PeerSnapshot {
            id: peer,
            strategy: host.scan(peer),
            fitness: host.fitness(peer),
        })
        .collect()
}
