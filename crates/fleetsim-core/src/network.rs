//! Directed friendship graph agents imitate through.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use tracing::{debug, warn};

use crate::{AgentId, LearningError};

/// Adjacency lists keyed by agent. An edge `a -> b` means `a` can observe and copy `b`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialNetwork {
    friends: SecondaryMap<AgentId, Vec<AgentId>>,
}

impl SocialNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a network where each agent befriends `degree` distinct random others.
    ///
    /// `degree` is reduced to `agents.len() - 1` when the population is too small.
    pub fn equidegree(
        agents: &[AgentId],
        degree: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self, LearningError> {
        if agents.len() < 2 {
            return Err(LearningError::NetworkTooSmall(agents.len()));
        }
        let effective = degree.min(agents.len() - 1);
        if effective < degree {
            warn!(
                requested = degree,
                effective,
                population = agents.len(),
                "population too small for requested degree"
            );
        }

        let mut network = Self::new();
        for &agent in agents {
            network.add_agent(agent);
        }
        for (position, &agent) in agents.iter().enumerate() {
            let candidates: Vec<AgentId> = agents
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != position)
                .map(|(_, &id)| id)
                .collect();
            for picked in rand::seq::index::sample(rng, candidates.len(), effective) {
                network.befriend(agent, candidates[picked]);
            }
        }
        debug!(agents = agents.len(), degree = effective, "built equidegree network");
        Ok(network)
    }

    pub fn add_agent(&mut self, agent: AgentId) {
        if !self.friends.contains_key(agent) {
            self.friends.insert(agent, Vec::new());
        }
    }

    /// Remove the agent and every edge pointing at it.
    pub fn remove_agent(&mut self, agent: AgentId) {
        self.friends.remove(agent);
        for list in self.friends.values_mut() {
            list.retain(|&friend| friend != agent);
        }
    }

    #[must_use]
    pub fn contains(&self, agent: AgentId) -> bool {
        self.friends.contains_key(agent)
    }

    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.friends.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.friends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.friends.is_empty()
    }

    /// Outgoing edges of `agent`; empty for unknown agents.
    #[must_use]
    pub fn friends(&self, agent: AgentId) -> &[AgentId] {
        self.friends.get(agent).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_friend(&self, agent: AgentId, other: AgentId) -> bool {
        self.friends(agent).contains(&other)
    }

    /// Add `agent -> other`. Self-loops and duplicates are refused.
    pub fn befriend(&mut self, agent: AgentId, other: AgentId) -> bool {
        if agent == other || self.is_friend(agent, other) {
            return false;
        }
        self.add_agent(other);
        self.add_agent(agent);
        match self.friends.get_mut(agent) {
            Some(list) => {
                list.push(other);
                true
            }
            None => false,
        }
    }

    pub fn unfriend(&mut self, agent: AgentId, other: AgentId) -> bool {
        let Some(list) = self.friends.get_mut(agent) else {
            return false;
        };
        let before = list.len();
        list.retain(|&friend| friend != other);
        list.len() != before
    }

    /// Drop `dropped` and befriend a random agent that is neither a friend nor `dropped`.
    ///
    /// Returns the new friend, or `None` when nobody is left to befriend.
    pub fn rewire(
        &mut self,
        agent: AgentId,
        dropped: AgentId,
        rng: &mut dyn RngCore,
    ) -> Option<AgentId> {
        self.unfriend(agent, dropped);
        let candidates: Vec<AgentId> = self
            .agents()
            .filter(|&other| other != agent && other != dropped && !self.is_friend(agent, other))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let replacement = candidates[rng.random_range(0..candidates.len())];
        self.befriend(agent, replacement);
        debug!(?agent, ?dropped, ?replacement, "rewired friendship");
        Some(replacement)
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.friends.values().map(Vec::len).sum()
    }
}
