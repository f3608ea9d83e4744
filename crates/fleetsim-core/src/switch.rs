//! Mapping from a large discrete domain (map cells, gear catalogue) onto dense bandit arms.

use std::collections::HashMap;
use std::hash::Hash;

use crate::LearningError;

/// Bijection between valid groups of a domain `0..domain_size` and arms `0..arms`.
///
/// Groups are numbered in order of their first domain index; that index becomes the group's
/// representative. Indices whose grouping returns `None` map to no arm.
#[derive(Debug, Clone)]
pub struct BanditSwitch<G = usize> {
    groups: Vec<Option<G>>,
    arm_of_group: HashMap<G, usize>,
    representatives: Vec<usize>,
}

impl<G: Clone + Eq + Hash> BanditSwitch<G> {
    pub fn new<F>(domain_size: usize, group_of: F) -> Result<Self, LearningError>
    where
        F: Fn(usize) -> Option<G>,
    {
        let mut groups = Vec::with_capacity(domain_size);
        let mut arm_of_group = HashMap::new();
        let mut representatives = Vec::new();
        for index in 0..domain_size {
            let group = group_of(index);
            if let Some(group) = &group {
                if !arm_of_group.contains_key(group) {
                    arm_of_group.insert(group.clone(), representatives.len());
                    representatives.push(index);
                }
            }
            groups.push(group);
        }
        if representatives.is_empty() {
            return Err(LearningError::InvalidConfig(
                "bandit switch needs at least one valid domain index",
            ));
        }
        Ok(Self {
            groups,
            arm_of_group,
            representatives,
        })
    }

    #[must_use]
    pub fn domain_size(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn arms(&self) -> usize {
        self.representatives.len()
    }

    #[must_use]
    pub fn group(&self, index: usize) -> Option<&G> {
        self.groups.get(index).and_then(Option::as_ref)
    }

    /// Arm for a representative index; `None` for every other index.
    #[must_use]
    pub fn arm(&self, index: usize) -> Option<usize> {
        let arm = self.group_arm(index)?;
        (self.representatives[arm] == index).then_some(arm)
    }

    /// Arm of the group `index` belongs to, whether or not it is the representative.
    #[must_use]
    pub fn group_arm(&self, index: usize) -> Option<usize> {
        self.group(index)
            .and_then(|group| self.arm_of_group.get(group).copied())
    }

    /// Domain index standing in for `arm`.
    #[must_use]
    pub fn representative(&self, arm: usize) -> Option<usize> {
        self.representatives.get(arm).copied()
    }
}

impl BanditSwitch<usize> {
    /// One arm per index that passes `is_valid`.
    pub fn from_validator<F>(domain_size: usize, is_valid: F) -> Result<Self, LearningError>
    where
        F: Fn(usize) -> bool,
    {
        Self::new(domain_size, |index| is_valid(index).then_some(index))
    }
}
